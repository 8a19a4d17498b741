//! Binary entrypoint that opens the persisted chat client state.

use std::process::ExitCode;

use chatline::start_chatline;

fn main() -> ExitCode {
    start_chatline::run()
}
