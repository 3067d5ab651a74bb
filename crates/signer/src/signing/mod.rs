mod command;
mod content;
mod invoker;
mod request;

pub use command::SmimeCommand;
pub use content::Content;
pub use invoker::{ProcessInfo, SignResult, SigningInvoker, sign};
pub use request::{OutputFormat, SignRequest};
