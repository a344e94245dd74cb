// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for mesh cutting and query operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised at the internal seams of the cut/query engine.
///
/// Public queries never surface these; they degrade to empty results.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Triangulation failed: {0}")]
    TriangulationError(String),

    #[error("Invalid polygon: {0}")]
    InvalidPolygon(String),

    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),
}
