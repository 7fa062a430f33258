#[cfg(test)]
mod tests {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn bin() -> Command {
        let mut cmd = Command::cargo_bin("kernel_bundler_release").unwrap();
        cmd.env_remove("KBUILD_BUILD_USER")
            .env_remove("KBUILD_BUILD_HOST")
            .env_remove("KERNEL_TOOLCHAIN_DIR");
        cmd
    }

    #[test]
    fn test_help_lists_modes() {
        bin()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--regen"))
            .stdout(predicate::str::contains("--clean"))
            .stdout(predicate::str::contains("--skip-deps"));
    }

    #[test]
    fn test_regen_and_clean_together_is_usage_error() {
        bin()
            .args(["-r", "-c"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("cannot be used with"));
    }

    #[test]
    fn test_zero_jobs_exits_with_failure() {
        let tmp = TempDir::new().unwrap();
        bin()
            .current_dir(tmp.path())
            .args(["--jobs", "0", "--skip-deps", "--no-upload"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("--jobs must be at least 1"));
    }

    #[test]
    fn test_unknown_profile_key_exits_with_failure() {
        let tmp = TempDir::new().unwrap();
        let profile = tmp.path().join("kernel-release.toml");
        std::fs::write(&profile, "[device]\ncodename = \"ginkgo\"\nboard = \"x\"\n").unwrap();

        bin()
            .current_dir(tmp.path())
            .args(["--skip-deps", "--no-upload"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("parsing device profile"));
    }

    #[test]
    fn test_missing_profile_file_exits_with_failure() {
        let tmp = TempDir::new().unwrap();
        bin()
            .current_dir(tmp.path())
            .args(["--profile", "does-not-exist.toml", "--skip-deps", "--no-upload"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("reading device profile"));
    }

    /// Accept one HTTP request, drain its body, answer `200` with `reply`.
    /// Returns the base URL and a handle yielding the request line.
    #[cfg(unix)]
    fn serve_once(reply: &'static str) -> (String, std::thread::JoinHandle<String>) {
        use std::io::{BufRead, BufReader, Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let mut content_length = 0usize;
            loop {
                let mut header = String::new();
                reader.read_line(&mut header).unwrap();
                if header.trim().is_empty() {
                    break;
                }
                if let Some((key, value)) = header.split_once(':')
                    && key.eq_ignore_ascii_case("content-length")
                {
                    content_length = value.trim().parse().unwrap();
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();

            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                reply.len(),
                reply
            )
            .unwrap();
            request_line
        });
        (format!("http://{addr}"), handle)
    }

    #[cfg(unix)]
    const FAKE_MAKE: &str = r#"#!/bin/sh
out=""
compile=0
for arg in "$@"; do
  case "$arg" in
    O=*) out="${arg#O=}" ;;
    -j*) compile=1 ;;
  esac
done
if [ "$compile" = 1 ]; then
  mkdir -p "$out/arch/arm64/boot"
  printf 'kernel' > "$out/arch/arm64/boot/Image.gz-dtb"
fi
exit 0
"#;

    #[cfg(unix)]
    #[test]
    fn test_quiet_run_still_reports_summary_and_upload_url() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let bin_dir = tmp.path().join("bin");
        let source = tmp.path().join("kernel");
        let work = tmp.path().join("work");
        let cache = tmp.path().join("AnyKernel3");
        for dir in [&bin_dir, &source, &work, &cache] {
            std::fs::create_dir_all(dir).unwrap();
        }

        let make = bin_dir.join("make");
        std::fs::write(&make, FAKE_MAKE).unwrap();
        std::fs::set_permissions(&make, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::write(cache.join("anykernel.sh"), "# template\n").unwrap();

        let (host, server) = serve_once("https://files.example.com/k7Qx/kernel.zip\n");
        std::fs::write(
            source.join("kernel-release.toml"),
            format!(
                "[packaging]\ntemplate_cache = \"{}\"\n\n[upload]\nfile_host = \"{}\"\n",
                cache.display(),
                host
            ),
        )
        .unwrap();

        let path = std::env::join_paths(
            std::iter::once(bin_dir.clone())
                .chain(std::env::split_paths(&std::env::var_os("PATH").unwrap_or_default())),
        )
        .unwrap();

        bin()
            .current_dir(&work)
            .env("PATH", path)
            .env("TZ", "UTC")
            .env_remove("http_proxy")
            .env_remove("HTTP_PROXY")
            .env_remove("all_proxy")
            .env_remove("ALL_PROXY")
            .args(["-q", "--skip-deps", "--source"])
            .arg(&source)
            .write_stdin("2\n")
            .assert()
            .success()
            .stdout(predicate::str::contains("Build completed in"))
            .stdout(predicate::str::contains(" MB)"))
            .stdout(predicate::str::contains(
                "https://files.example.com/k7Qx/kernel.zip",
            ))
            .stdout(predicate::str::contains("═══").not());

        let request_line = server.join().unwrap();
        assert!(request_line.starts_with("PUT /Kernel-lavender-"), "{request_line}");
    }
}
