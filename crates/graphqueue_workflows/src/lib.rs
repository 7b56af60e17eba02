//! Workflow definition loading, parameter resolution, prompt
//! materialization, and input staging.

pub mod definition;
pub mod materializer;
pub mod node;
pub mod resolver;
pub mod stager;

pub use definition::{
    load_all, load_one, DefinitionError, InputType, ModelRewireCandidate, ModelRewireTarget,
    NodeBinding, ParamType, ParameterDef, SwitchState, WorkflowDefinition,
};
pub use materializer::{build_prompts, MaterializeError, PromptSpec};
pub use resolver::{resolve, ValidationError};
pub use stager::{new_batch_token, stage_file, StageError, StagedFile};
