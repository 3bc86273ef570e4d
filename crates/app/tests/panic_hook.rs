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


use std::{panic, sync::Arc};

use logspool_app::{DEFAULT_TIME_FORMAT, LineFormat, Logger};
use logspool_common_queue::{QueueBuilder, QueueStore};
use tempfile::TempDir;

#[test]
fn test_panic_is_queued_as_error_record() {
    let temp = TempDir::new().unwrap();
    let store: Arc<dyn QueueStore> = Arc::new(QueueBuilder::new(temp.path().join("q")).build());
    let format = LineFormat::new("%loglevel% %file% | ", DEFAULT_TIME_FORMAT).unwrap();
    let logger = Logger::new(store.clone(), temp.path().join("app.log"), format);
    logger.install_panic_hook();

    let panic_line = line!() + 1;
    let outcome = panic::catch_unwind(|| panic!("boom {}", 7));
    drop(panic::take_hook());
    assert!(outcome.is_err());

    assert!(store.get(true).unwrap().is_none());
    let record = store.get(false).unwrap().expect("panic record");
    assert!(
        record.message.starts_with("ERROR "),
        "unexpected record {:?}",
        record.message
    );
    assert!(record.message.contains(&format!("{}:{panic_line}", file!())));
    assert!(record.message.ends_with(" | Unhandled panic: boom 7"));
    assert!(!record.priority);
    let detail = record.failure_detail.unwrap();
    assert!(detail.starts_with("panicked: boom 7\n"));
    assert!(store.get(false).unwrap().is_none());
}
