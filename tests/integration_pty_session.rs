// Drives the compiled binary through a PTY so the real crossterm event
// loop runs end to end.
//
// Requires a pseudo terminal, so it is Unix-only and ignored by default.
// Run manually via: `cargo test --test integration_pty_session -- --ignored`.

#![cfg(unix)]

use std::time::Duration;

use expectrl::{spawn, Eof};

#[test]
#[ignore]
fn short_custom_stage_runs_and_exits() -> Result<(), Box<dyn std::error::Error>> {
    let home = tempfile::tempdir()?;
    let bin = assert_cmd::cargo::cargo_bin("lectern");
    let cmd = format!(
        "env HOME={} {} --no-bell --stage Sprint=0:02",
        home.path().display(),
        bin.display()
    );

    let mut p = spawn(cmd)?;
    std::thread::sleep(Duration::from_millis(200));

    // start, let the stage run into overtime, then stop and quit
    p.send(" ")?;
    std::thread::sleep(Duration::from_millis(2500));
    p.send("s")?;
    std::thread::sleep(Duration::from_millis(100));
    p.send("q")?;

    p.expect(Eof)?;
    Ok(())
}
