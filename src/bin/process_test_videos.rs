use std::process::ExitCode;

use test_video_archiver::cli::run_process_test_videos;

fn main() -> ExitCode {
    match run_process_test_videos(std::env::args().skip(1)) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("process_test_videos: {err}");
            ExitCode::FAILURE
        }
    }
}
