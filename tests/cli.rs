use std::process::Command;

fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::new();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn capture_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_jarvis-capture").expect("jarvis-capture test binary not built")
}

#[test]
fn help_mentions_name() {
    let output = Command::new(capture_bin())
        .arg("--help")
        .output()
        .expect("run jarvis-capture --help");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("Jarvis voice capture"));
    assert!(combined.contains("--vad-threshold"));
    assert!(combined.contains("--silence-timeout-ms"));
}

#[test]
fn list_input_devices_prints_message() {
    let output = Command::new(capture_bin())
        .arg("--list-input-devices")
        .output()
        .expect("run jarvis-capture --list-input-devices");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(
        combined.contains("audio input devices")
            || combined.contains("Failed to list audio input devices")
    );
}

#[test]
fn rejects_out_of_range_threshold() {
    let output = Command::new(capture_bin())
        .args(["--vad-threshold", "1.5"])
        .output()
        .expect("run jarvis-capture with bad threshold");
    assert!(!output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("--vad-threshold"));
}

#[test]
fn rejects_silence_timeout_above_max_duration() {
    let output = Command::new(capture_bin())
        .args(["--silence-timeout-ms", "5000", "--max-duration-ms", "2000"])
        .output()
        .expect("run jarvis-capture with inconsistent timeouts");
    assert!(!output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("--silence-timeout-ms"));
}
