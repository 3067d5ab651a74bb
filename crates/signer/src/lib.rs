pub mod error;
pub mod server;
pub mod signing;

pub use error::{InputField, ServerError, SignError};
pub use server::{AppState, Credentials, router, run};
pub use signing::{
    Content, OutputFormat, ProcessInfo, SignRequest, SignResult, SigningInvoker, SmimeCommand,
    sign,
};
