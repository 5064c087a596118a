//! Command builder for llama-server.
//!
//! Turns a model key and `LaunchOptions` into the concrete invocation:
//!
//! ```text
//! llama-server -m <model> -c <ctx> -ngl <layers> -t <threads>
//!     --host <host> --port <port> [--mmproj <path>] [extra args...]
//! ```

use llamactl_core::{LaunchOptions, ModelKey};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Build the llama-server command with piped stdout/stderr.
///
/// The child is killed if its handle is dropped, so a torn-down runtime never
/// leaves servers behind.
pub fn build_command(
    server_path: &Path,
    host: &str,
    model_key: &ModelKey,
    options: &LaunchOptions,
    port: u16,
) -> Command {
    let mut cmd = Command::new(server_path);
    cmd.arg("-m")
        .arg(model_key.as_path())
        .arg("-c")
        .arg(options.context_size.to_string())
        .arg("-ngl")
        .arg(options.gpu_layers.to_string())
        .arg("-t")
        .arg(options.threads.to_string())
        .arg("--host")
        .arg(host)
        .arg("--port")
        .arg(port.to_string());

    if let Some(mmproj) = options.effective_mmproj() {
        cmd.arg("--mmproj").arg(mmproj);
    }

    for arg in &options.extra_args {
        cmd.arg(arg);
    }

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_default_arguments() {
        let key = ModelKey::new("/models/llama.gguf").unwrap();
        let cmd = build_command(
            Path::new("/opt/llama-server"),
            "127.0.0.1",
            &key,
            &LaunchOptions::default(),
            8081,
        );

        assert_eq!(cmd.as_std().get_program(), "/opt/llama-server");
        assert_eq!(
            args_of(&cmd),
            [
                "-m",
                "/models/llama.gguf",
                "-c",
                "4096",
                "-ngl",
                "4",
                "-t",
                "4",
                "--host",
                "127.0.0.1",
                "--port",
                "8081"
            ]
        );
    }

    #[test]
    fn test_mmproj_only_when_multimodal() {
        let key = ModelKey::new("/models/llava.gguf").unwrap();
        let mut options = LaunchOptions::default().with_mmproj("/models/mmproj.gguf");
        let cmd = build_command(Path::new("llama-server"), "127.0.0.1", &key, &options, 9000);
        let args = args_of(&cmd);
        let idx = args.iter().position(|a| a == "--mmproj").unwrap();
        assert_eq!(args[idx + 1], "/models/mmproj.gguf");

        options.multimodal = false;
        let cmd = build_command(Path::new("llama-server"), "127.0.0.1", &key, &options, 9000);
        assert!(!args_of(&cmd).contains(&"--mmproj".to_string()));
    }

    #[test]
    fn test_extra_args_are_appended() {
        let key = ModelKey::new("/models/a.gguf").unwrap();
        let options = LaunchOptions::default()
            .with_context_size(8192)
            .with_extra_args(vec!["--log-format".into(), "json".into()]);
        let cmd = build_command(Path::new("llama-server"), "127.0.0.1", &key, &options, 9000);
        let args = args_of(&cmd);
        assert!(args.contains(&"8192".to_string()));
        assert_eq!(&args[args.len() - 2..], ["--log-format", "json"]);
    }
}
