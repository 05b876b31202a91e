use super::*;

#[cfg(unix)]
fn sh(script: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", script]);
    cmd
}

#[cfg(unix)]
#[test]
fn reader_splits_stdout_into_frames() {
    let mut pipe = RawVideoPipe::spawn(sh("printf abcdefg"), 3, 4, "printf").unwrap();
    let mut frames = Vec::new();
    loop {
        match pipe.recv_timeout(Duration::from_secs(5)) {
            PipeRecv::Frame(f) => frames.push(f),
            PipeRecv::Closed => break,
            PipeRecv::Empty => panic!("child produced nothing in time"),
        }
    }
    // The trailing partial frame is dropped.
    assert_eq!(frames, vec![b"abc".to_vec(), b"def".to_vec()]);
    assert!(pipe.is_running());
    pipe.stop();
    assert!(!pipe.is_running());
    assert_eq!(pipe.stop(), "");
}

#[cfg(unix)]
#[test]
fn writer_delivers_frames_and_reports_exit() {
    let out = std::env::temp_dir().join(format!("arcast_pipe_{}.raw", std::process::id()));
    let script = format!("cat > '{}'", out.display());
    let mut writer = RawVideoWriter::spawn(sh(&script), "cat").unwrap();
    writer.write_frame(&[1, 2, 3, 4]).unwrap();
    writer.write_frame(&[5, 6, 7, 8]).unwrap();
    assert_eq!(writer.frames(), 2);
    let exit = writer.finish().unwrap();
    assert!(exit.status.success());
    assert_eq!(std::fs::read(&out).unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    let _ = std::fs::remove_file(&out);

    assert!(writer.finish().is_err());
    assert!(writer.write_frame(&[0]).is_err());
}

#[cfg(unix)]
#[test]
fn failing_writer_surfaces_stderr() {
    let mut writer = RawVideoWriter::spawn(sh("echo 'bad codec' >&2; exit 3"), "fail").unwrap();
    let exit = writer.finish().unwrap();
    assert!(!exit.status.success());
    assert_eq!(exit.stderr, "bad codec");
}
