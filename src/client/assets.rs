// Copyright © 2018 Cormac O'Brien
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use std::collections::HashMap;

use crate::common::net::{configstring::ConfigStringKind, gamestate::GameState};

/// Resolves asset names found in config strings.
pub trait AssetManager {
    fn read_asset(&self, name: &str) -> Option<Vec<u8>>;
}

/// Assets held in memory, keyed by name.
#[derive(Default)]
pub struct MemoryAssets {
    assets: HashMap<String, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> MemoryAssets {
        MemoryAssets::default()
    }

    pub fn insert<S>(&mut self, name: S, data: Vec<u8>)
    where
        S: Into<String>,
    {
        self.assets.insert(name.into(), data);
    }
}

impl AssetManager for MemoryAssets {
    fn read_asset(&self, name: &str) -> Option<Vec<u8>> {
        self.assets.get(name).cloned()
    }
}

/// Asset names referenced by the game state that `assets` cannot provide, in index order.
///
/// Inline brush models (`*n`) live in the map and are never missing.
pub fn missing_assets(gamestate: &GameState, assets: &dyn AssetManager) -> Vec<String> {
    gamestate
        .non_empty()
        .filter(|(i, _)| ConfigStringKind::of(*i).is_asset())
        .filter(|(_, name)| !name.starts_with('*'))
        .filter(|(_, name)| assets.read_asset(name).is_none())
        .map(|(_, name)| name.to_owned())
        .collect()
}
