// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parses a caller-supplied PKCS#12 (`.p12`/`.pfx`) blob into the
//! `(RsaPrivateKey, certificate, intermediate chain)` identity that
//! [`crate::signing::signer::SignatureSigner`] consumes.
//!
//! This is a thin adapter over the `p12` crate's BER-level `SafeBag`
//! iteration; PKCS#12 does not itself say which bag is "the" leaf
//! certificate, so we take the first certificate encountered as the leaf
//! and treat the rest as the intermediate chain. The passphrase is held
//! only long enough to decrypt the key bag and is never logged.

use p12::{CertBag, ContentInfo, SafeBag, SafeBagKind};
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use x509_certificate::CapturedX509Certificate;

use crate::error::{AppError, Result};
use crate::signing::signer::SigningIdentity;

/// Encodes `s` as a PKCS#12 "BMPString" password: UTF-16BE with a trailing
/// NUL code point, the encoding PKCS#12's key/MAC derivation expects.
fn bmp_string(s: &str) -> Vec<u8> {
    let utf16: Vec<u16> = s.encode_utf16().collect();
    let mut bytes = Vec::with_capacity(utf16.len() * 2 + 2);
    for unit in utf16 {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    bytes.extend_from_slice(&[0x00, 0x00]);
    bytes
}

/// Loads a signing identity from PKCS#12 bytes plus the passphrase used to
/// protect it.
pub struct IdentityLoader;

impl IdentityLoader {
    pub fn load(pkcs12_data: &[u8], password: &str) -> Result<SigningIdentity> {
        let pfx = p12::PFX::parse(pkcs12_data)
            .map_err(|e| AppError::Identity(format!("data does not look like PKCS#12: {e:?}")))?;

        if !pfx.verify_mac(password) {
            return Err(AppError::Identity(
                "PKCS#12 MAC verification failed; wrong password?".to_string(),
            ));
        }

        let outer_data = match pfx.auth_safe {
            ContentInfo::Data(data) => data,
            _ => {
                return Err(AppError::Identity(
                    "unexpected PKCS#12 outer ContentInfo kind".to_string(),
                ))
            }
        };

        let content_infos = yasna::parse_der(&outer_data, |reader| {
            reader.collect_sequence_of(ContentInfo::parse)
        })
        .map_err(|e| AppError::Identity(format!("failed parsing inner ContentInfo: {e:?}")))?;

        let bmp_password = bmp_string(password);

        let mut certificates = Vec::new();
        let mut private_key = None;

        for content in content_infos {
            let bags_data = match content {
                ContentInfo::Data(inner) => inner,
                ContentInfo::EncryptedData(encrypted) => {
                    encrypted.data(&bmp_password).ok_or_else(|| {
                        AppError::Identity("failed decrypting inner EncryptedData".to_string())
                    })?
                }
                ContentInfo::OtherContext(_) => {
                    return Err(AppError::Identity(
                        "unexpected OtherContext content in PKCS#12 data".to_string(),
                    ));
                }
            };

            let bags = yasna::parse_ber(&bags_data, |reader| {
                reader.collect_sequence_of(SafeBag::parse)
            })
            .map_err(|e| AppError::Identity(format!("failed parsing SafeBag sequence: {e:?}")))?;

            for bag in bags {
                match bag.bag {
                    SafeBagKind::CertBag(CertBag::X509(cert_der)) => {
                        let cert = CapturedX509Certificate::from_der(cert_der).map_err(|e| {
                            AppError::Identity(format!("failed parsing X.509 certificate: {e}"))
                        })?;
                        certificates.push(cert);
                    }
                    SafeBagKind::CertBag(CertBag::SDSI(_)) => {
                        return Err(AppError::Identity(
                            "SDSI certificates are not supported".to_string(),
                        ));
                    }
                    SafeBagKind::Pkcs8ShroudedKeyBag(key_bag) => {
                        let decrypted = key_bag.decrypt(&bmp_password).ok_or_else(|| {
                            AppError::Identity(
                                "failed decrypting private key bag; wrong password?".to_string(),
                            )
                        })?;
                        let key = RsaPrivateKey::from_pkcs8_der(&decrypted).map_err(|e| {
                            AppError::Identity(format!(
                                "signing key is not a PKCS#8 RSA private key: {e}"
                            ))
                        })?;
                        private_key = Some(key);
                    }
                    SafeBagKind::OtherBagKind(_) => {
                        return Err(AppError::Identity(
                            "unrecognized SafeBag kind in PKCS#12 data".to_string(),
                        ));
                    }
                }
            }
        }

        let private_key = private_key
            .ok_or_else(|| AppError::Identity("no private key found in PKCS#12 data".to_string()))?;

        if certificates.is_empty() {
            return Err(AppError::Identity(
                "no certificate found in PKCS#12 data".to_string(),
            ));
        }

        let mut certificates = certificates.into_iter();
        let certificate = certificates.next().unwrap();
        let chain = certificates.collect();

        Ok(SigningIdentity {
            private_key,
            certificate,
            chain,
        })
    }
}
