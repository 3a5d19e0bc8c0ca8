mod build;
mod keygen;
mod verify;

pub use build::{BuildArgs, cmd_build};
pub use keygen::{KeygenArgs, cmd_keygen};
pub use verify::{VerifyArgs, cmd_verify};
