//! Service provider metadata.

use quick_xml::escape::escape;

use crate::constants::{SamlBinding, MD_NS, XMLDSIG_NS};
use crate::error::SamlResult;
use crate::trust::TrustDescriptor;

/// Generates SAML 2.0 SP metadata for `trust`.
///
/// The own certificate, when configured, is published for both signing and
/// encryption.
///
/// # Errors
///
/// Returns an error if the own certificate is not valid PEM.
pub fn sp_metadata(trust: &TrustDescriptor, acs_url: &str, slo_url: &str) -> SamlResult<String> {
    let key_descriptors = match trust.own_certificate_pem() {
        Some(pem) => {
            let body = fib_crypto::pem_body(pem, "CERTIFICATE")?;
            ["signing", "encryption"]
                .iter()
                .map(|usage| {
                    format!(
                        r#"
        <md:KeyDescriptor use="{usage}">
            <ds:KeyInfo xmlns:ds="{XMLDSIG_NS}">
                <ds:X509Data>
                    <ds:X509Certificate>{body}</ds:X509Certificate>
                </ds:X509Data>
            </ds:KeyInfo>
        </md:KeyDescriptor>"#
                    )
                })
                .collect::<String>()
        }
        None => String::new(),
    };

    Ok(format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<md:EntityDescriptor xmlns:md="{MD_NS}" entityID="{entity_id}">
    <md:SPSSODescriptor AuthnRequestsSigned="true" WantAssertionsSigned="true" protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">{key_descriptors}
        <md:SingleLogoutService Binding="{redirect}" Location="{slo}"/>
        <md:NameIDFormat>{name_id_format}</md:NameIDFormat>
        <md:AssertionConsumerService index="0" isDefault="true" Binding="{post}" Location="{acs}"/>
    </md:SPSSODescriptor>
</md:EntityDescriptor>"#,
        entity_id = escape(trust.sp_entity_id()),
        redirect = SamlBinding::HttpRedirect.uri(),
        slo = escape(slo_url),
        name_id_format = escape(trust.name_id_format()),
        post = SamlBinding::HttpPost.uri(),
        acs = escape(acs_url),
    ))
}
