// Copyright 2019 Guillaume Becquin
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::common::error::RustPointerGenError;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// # Utility to deserialize JSON model configurations
pub trait Config
where
    for<'de> Self: Deserialize<'de>,
{
    /// Loads a model configuration from a JSON file.
    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RustPointerGenError> {
        let f = File::open(path)?;
        let br = BufReader::new(f);
        let config = serde_json::from_reader(br)?;
        Ok(config)
    }
}
