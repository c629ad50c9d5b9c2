use super::{AttestationType, Statement};
use crate::Error;

pub(super) fn verify(statement: &Statement<'_>) -> Result<(AttestationType, Vec<Vec<u8>>), Error> {
    if !statement.stmt.is_empty() {
        return Err(Error::malformed_attestation(
            "`none` attestation statement must be empty",
        ));
    }
    Ok((AttestationType::None, Vec::new()))
}
