// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use std::{collections::HashSet, fs, path::Path, sync::Arc, thread, time::Duration};

use logspool_app::{
    Failure, LATEST_FILE_NAME, Pipeline, PipelineConfig, SpawnMode, spool_debug, spool_info,
};
use logspool_common_queue::QueueClass;
use tempfile::TempDir;

fn in_process_config(temp: &TempDir) -> PipelineConfig {
    PipelineConfig::builder()
        .queue_dir(temp.path().join("logs/.cache"))
        .destination(temp.path().join("logs/%TIMENOW%.log").display().to_string())
        .fallback_file(temp.path().join("logspool_error.log"))
        .line_format("%loglevel% | ")
        .idle_interval_ms(20)
        .final_drain_grace_ms(50)
        .shutdown_timeout_ms(5_000)
        .spawn(SpawnMode::InProcess)
        .build()
}

fn lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
fn test_debug_is_written_before_earlier_info() {
    logspool_common_telemetry::init_default_ut_logging();
    let temp = TempDir::new().unwrap();
    let mut pipeline = Pipeline::new(in_process_config(&temp)).unwrap();
    let logger = pipeline.logger();

    // queued before the consumer exists
    spool_info!(logger, "boot").unwrap();
    spool_debug!(logger, "tick").unwrap();

    pipeline.start().unwrap();
    assert!(pipeline.shutdown().unwrap());

    assert_eq!(lines(pipeline.destination()), ["DEBUG | tick", "INFO | boot"]);
}

#[test]
fn test_concurrent_producers_lose_nothing() {
    let temp = TempDir::new().unwrap();
    let mut pipeline = Pipeline::new(in_process_config(&temp)).unwrap();
    pipeline.start().unwrap();

    let logger = Arc::new(pipeline.logger());
    let producers: Vec<_> = (0..50)
        .map(|i| {
            let logger = logger.clone();
            thread::spawn(move || spool_info!(logger, "producer {i}").unwrap())
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    assert!(pipeline.shutdown().unwrap());
    assert!(pipeline.store().is_empty(QueueClass::Both).unwrap());

    let written = lines(pipeline.destination());
    assert_eq!(written.len(), 50);
    let unique: HashSet<_> = written.iter().collect();
    assert_eq!(unique.len(), 50);
    for i in 0..50 {
        assert!(unique.contains(&format!("INFO | producer {i}")));
    }
}

#[test]
fn test_records_logged_while_running_are_delivered() {
    let temp = TempDir::new().unwrap();
    let mut pipeline = Pipeline::new(in_process_config(&temp)).unwrap();
    pipeline.start().unwrap();
    let logger = pipeline.logger();

    logger.warning("disk at 91%").unwrap();
    logger
        .error("upload failed", Failure::message("connection reset"))
        .unwrap();

    let destination = pipeline.destination().to_path_buf();
    let mut waited = Duration::ZERO;
    while waited < Duration::from_secs(5)
        && !pipeline.store().is_empty(QueueClass::Both).unwrap()
    {
        thread::sleep(Duration::from_millis(20));
        waited += Duration::from_millis(20);
    }
    assert!(pipeline.handle().unwrap().is_running());
    assert_eq!(lines(&destination), [
        "WARNING | disk at 91%",
        "ERROR | upload failed",
        "connection reset",
    ]);

    assert!(pipeline.shutdown().unwrap());
    assert!(!pipeline.shutdown().unwrap());
}

#[test]
fn test_start_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let latest = temp.path().join("logs").join(LATEST_FILE_NAME);
    fs::create_dir_all(latest.parent().unwrap()).unwrap();
    fs::write(&latest, "previous run\n").unwrap();

    let mut pipeline = Pipeline::new(in_process_config(&temp)).unwrap();
    pipeline.start().unwrap();
    assert!(!latest.exists());
    fs::write(&latest, "current run\n").unwrap();

    // second start keeps the consumer and does not rotate again
    assert!(pipeline.start().unwrap().is_running());
    assert_eq!(fs::read_to_string(&latest).unwrap(), "current run\n");

    let archived: Vec<_> = fs::read_dir(temp.path().join("logs"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".log") && name != LATEST_FILE_NAME)
        .collect();
    assert_eq!(archived.len(), 1);

    assert!(pipeline.shutdown().unwrap());
}

#[test]
fn test_unwritable_destination_goes_to_fallback() {
    let temp = TempDir::new().unwrap();
    let mut config = in_process_config(&temp);
    config.use_latest_alias = false;
    let mut pipeline = Pipeline::new(config).unwrap();
    // a directory where the log file should be
    fs::create_dir_all(pipeline.destination()).unwrap();

    pipeline.logger().info("lost line").unwrap();
    pipeline.start().unwrap();
    assert!(pipeline.shutdown().unwrap());

    let fallback = fs::read_to_string(temp.path().join("logspool_error.log")).unwrap();
    assert_eq!(fallback.matches("\"INFO | lost line\"").count(), 1);
    assert!(pipeline.store().is_empty(QueueClass::Both).unwrap());
}

#[test]
fn test_drop_shuts_down() {
    let temp = TempDir::new().unwrap();
    let destination = {
        let mut pipeline = Pipeline::new(in_process_config(&temp)).unwrap();
        pipeline.start().unwrap();
        pipeline.logger().info("last words").unwrap();
        pipeline.destination().to_path_buf()
    };
    assert_eq!(lines(&destination), ["INFO | last words"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_from_async_context() {
    let temp = TempDir::new().unwrap();
    let mut pipeline = Pipeline::new(in_process_config(&temp)).unwrap();
    pipeline.start().unwrap();
    pipeline.logger().info("from a task").unwrap();

    assert!(pipeline.shutdown().unwrap());
    assert_eq!(lines(pipeline.destination()), ["INFO | from a task"]);
}

#[tokio::test]
async fn test_drop_inside_async_context() {
    let temp = TempDir::new().unwrap();
    let destination = {
        let mut pipeline = Pipeline::new(in_process_config(&temp)).unwrap();
        pipeline.start().unwrap();
        pipeline.logger().info("dropped in a task").unwrap();
        pipeline.destination().to_path_buf()
    };
    assert_eq!(lines(&destination), ["INFO | dropped in a task"]);
}
