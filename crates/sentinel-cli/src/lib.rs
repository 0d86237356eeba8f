pub mod cli;
pub mod cmd;
pub mod logging;
pub mod output;
pub mod root;
