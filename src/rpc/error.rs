// Copyright 2019-2024 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use jsonrpsee::types::error::{ErrorObjectOwned, INTERNAL_ERROR_CODE, INVALID_PARAMS_CODE};

/// The wire never carries archive error detail; every internal failure is
/// the bare JSON-RPC internal error.
pub(crate) fn internal_error() -> ErrorObjectOwned {
    ErrorObjectOwned::owned::<()>(INTERNAL_ERROR_CODE, "Internal error", None)
}

pub(crate) fn invalid_params() -> ErrorObjectOwned {
    ErrorObjectOwned::owned::<()>(INVALID_PARAMS_CODE, "Invalid params", None)
}
