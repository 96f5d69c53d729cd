// Drives the compiled binary through a PTY so the real event loop and crossterm
// input handling are exercised.
//
// Requires a pseudo terminal (expectrl), so it is Unix-only and ignored by default.
// Run manually via: `cargo test --test integration_min_session -- --ignored`.

#![cfg(unix)]

use std::time::Duration;

use expectrl::{spawn, Eof};

#[test]
#[ignore]
fn minimal_session_starts_and_exits() -> Result<(), Box<dyn std::error::Error>> {
    let bin = assert_cmd::cargo::cargo_bin("tenfinger");
    let cmd = format!("{} --level 1", bin.display());

    let mut p = spawn(cmd)?;

    // let the app enter the alternate screen
    std::thread::sleep(Duration::from_millis(200));

    // home-row keys only; wrong ones are recorded, others ignored
    p.send("asdf")?;
    std::thread::sleep(Duration::from_millis(200));

    p.send("\x1b")?; // ESC

    p.expect(Eof)?;
    Ok(())
}
