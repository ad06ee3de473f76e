// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wraps a serialized CodeDirectory in a CMS (RFC 5652) `SignedData`
//! envelope, per §4.7. A bare RSA signature over the CodeDirectory is not
//! sufficient output here: the embedded signature slot must hold a full CMS
//! structure whose signed attributes cover the content-type and the
//! CodeDirectory's own digest.

use cryptographic_message_syntax::{Certificate, DigestAlgorithm, SignedDataBuilder, SignerBuilder, SigningKey};
use rsa::RsaPrivateKey;
use x509_certificate::CapturedX509Certificate;

use crate::error::{SigningError, SigningResult};

/// The loaded signing identity: a private key plus its leaf certificate and
/// any intermediates that should be embedded alongside it.
pub struct SigningIdentity {
    pub private_key: RsaPrivateKey,
    pub certificate: CapturedX509Certificate,
    pub chain: Vec<CapturedX509Certificate>,
}

pub struct SignatureSigner;

impl SignatureSigner {
    /// Produces the DER-encoded CMS `SignedData` over `code_directory`,
    /// ready to be wrapped as the signature-slot blob by
    /// [`crate::macho::super_blob::BlobEntry::cms_signature`].
    pub fn sign(code_directory: &[u8], identity: &SigningIdentity) -> SigningResult<Vec<u8>> {
        let signing_key = SigningKey::Rsa(identity.private_key.clone());

        let leaf = Certificate::from_der(identity.certificate.constructed_data()).map_err(|e| {
            SigningError::CryptoFailure {
                reason: format!("failed to parse signing certificate: {e}"),
            }
        })?;

        // `SignerBuilder` defaults to SHA-256 and `id-data` content type, and
        // `SignedDataBuilder::build_ber` fills in the mandatory content-type
        // and message-digest signed attributes from `signed_content` itself,
        // so no manual attribute wiring is needed here.
        let signer = SignerBuilder::new(&signing_key, leaf.clone());

        let mut builder = SignedDataBuilder::default()
            .signed_content(code_directory.to_vec())
            .signer(signer)
            .certificate(leaf)
            .map_err(|e| SigningError::CryptoFailure {
                reason: format!("failed to attach signing certificate: {e}"),
            })?;

        for intermediate in &identity.chain {
            let cert = Certificate::from_der(intermediate.constructed_data()).map_err(|e| {
                SigningError::CryptoFailure {
                    reason: format!("failed to parse intermediate certificate: {e}"),
                }
            })?;
            builder = builder.certificate(cert).map_err(|e| SigningError::CryptoFailure {
                reason: format!("failed to attach intermediate certificate: {e}"),
            })?;
        }

        builder.build_ber().map_err(|e| SigningError::CryptoFailure {
            reason: format!("CMS SignedData construction failed: {e}"),
        })
    }

    /// The digest algorithm used for signed attributes and the signature
    /// itself. CodeDirectory hashing is always SHA-256 (§4.5), so the CMS
    /// envelope matches it rather than negotiating a different one.
    pub fn digest_algorithm() -> DigestAlgorithm {
        DigestAlgorithm::Sha256
    }
}
