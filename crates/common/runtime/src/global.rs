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


use std::sync::Arc;

use once_cell::sync::OnceCell;
use tokio::runtime::Runtime;

use crate::{Result, options::RuntimeOptions};

static BACKGROUND: OnceCell<Arc<Runtime>> = OnceCell::new();

/// Shared runtime for workers registered without an explicit runtime.
///
/// Built lazily on first use with [`RuntimeOptions::background`].
pub fn background_runtime() -> Result<Arc<Runtime>> {
    BACKGROUND
        .get_or_try_init(|| RuntimeOptions::background().create().map(Arc::new))
        .cloned()
}

pub fn block_on_background<F>(future: F) -> Result<F::Output>
where
    F: Future,
{
    Ok(background_runtime()?.block_on(future))
}
