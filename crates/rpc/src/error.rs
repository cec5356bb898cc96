// This file is part of Wharf.
//
// Wharf is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Wharf is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Wharf.
// If not, see https://www.gnu.org/licenses/.

use jsonrpsee::types::{ErrorObject, ErrorObjectOwned};
use wharf_types::{ErrorKind, MempoolError};

pub(crate) const DEBUG_DISABLED: &str = "rpc: debug mode is not enabled";

/// Convert a pipeline error into a JSON-RPC error object; the data field
/// carries the stable error kind identifier
pub(crate) fn mempool_err(err: MempoolError) -> ErrorObjectOwned {
    let kind = err.kind();
    ErrorObject::owned(kind.code(), err.to_string(), Some(kind.as_str()))
}

pub(crate) fn internal_err(message: impl Into<String>) -> ErrorObjectOwned {
    ErrorObject::owned(
        ErrorKind::Internal.code(),
        message.into(),
        Some(ErrorKind::Internal.as_str()),
    )
}

#[cfg(test)]
mod tests {
    use wharf_types::FieldViolation;

    use super::*;

    #[test]
    fn carries_kind_code_and_identifier() {
        let err = mempool_err(MempoolError::FieldViolation(FieldViolation::ZeroSender));
        assert_eq!(err.code(), ErrorKind::InvalidFields.code());
        assert!(err.message().contains("sender is required"));
        assert_eq!(
            err.data().map(|d| d.get().trim_matches('"').to_owned()),
            Some("INVALID_FIELDS".to_owned())
        );
    }
}
