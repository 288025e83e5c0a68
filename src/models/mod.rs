mod action;
mod command;
mod slug;
mod workflow;

pub use action::ActionReference;
pub use command::RunCommand;
pub use slug::RepoSlug;
pub use workflow::WorkflowDocument;
