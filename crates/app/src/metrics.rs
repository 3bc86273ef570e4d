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


use std::sync::LazyLock;

use prometheus::{IntCounter, IntCounterVec, register_int_counter, register_int_counter_vec};

pub static RECORDS_ENQUEUED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "logspool_records_enqueued_total",
        "Records accepted by the producer API",
        &["level"]
    )
    .unwrap()
});

pub static RECORDS_WRITTEN: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "logspool_records_written_total",
        "Records appended to their destination file"
    )
    .unwrap()
});

pub static RECORDS_REDIRECTED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "logspool_records_redirected_total",
        "Records whose destination could not be written"
    )
    .unwrap()
});

pub static RECORDS_REDELIVERED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "logspool_records_redelivered_total",
        "Delivered records that could not be deleted and will be delivered again"
    )
    .unwrap()
});
