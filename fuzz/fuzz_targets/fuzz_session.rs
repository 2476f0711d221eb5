#![no_main]

use cipherline::config::SessionConfig;
use cipherline::protocol::selection::SelectionHandler;
use cipherline::protocol::Session;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Feed arbitrary bytes in small chunks; errors are fine, panics are not
    let mut session = Session::ciphered(SelectionHandler::new(), SessionConfig::default());
    for chunk in data.chunks(7) {
        if session.ingest(chunk).is_err() {
            return;
        }
        loop {
            match session.next_response() {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(_) => return,
            }
        }
    }
});
