//! Lookup over the tagged attribute blobs carried by cross-chain requests.
//!
//! Each attribute is a 4-byte selector followed by its ABI-encoded arguments.

use ethers::abi::{decode, ParamType, Token};
use ethers::types::{Bytes, U256};
use ethers::utils::id;

use crate::error::PaymasterError;

/// `reward(address,uint256)`: the reward asset and amount offered to the fulfiller.
pub fn reward_selector() -> [u8; 4] {
    id("reward(address,uint256)")
}

/// `precheck(address)`: hook the fulfiller must run during validation.
pub fn precheck_selector() -> [u8; 4] {
    id("precheck(address)")
}

/// `magicSpendRequest(uint256)`: execution value the fulfiller fronts to the sender.
pub fn magic_spend_request_selector() -> [u8; 4] {
    id("magicSpendRequest(uint256)")
}

fn has_tag(attribute: &Bytes, tag: [u8; 4]) -> bool {
    attribute.len() >= 4 && attribute[..4] == tag
}

/// Returns the first attribute whose selector equals `tag`.
pub fn locate(attributes: &[Bytes], tag: [u8; 4]) -> Result<&Bytes, PaymasterError> {
    attributes
        .iter()
        .find(|attribute| has_tag(attribute, tag))
        .ok_or(PaymasterError::AttributeNotFound(tag))
}

/// Like [`locate`], but reports absence through the flag.
///
/// When nothing matches the returned attribute is the first element (or `None` for an empty
/// list). It is a placeholder only; callers must branch on the flag.
pub fn locate_unchecked(attributes: &[Bytes], tag: [u8; 4]) -> (bool, Option<&Bytes>) {
    match attributes.iter().find(|attribute| has_tag(attribute, tag)) {
        Some(attribute) => (true, Some(attribute)),
        None => (false, attributes.first()),
    }
}

/// Decodes the payload of `tag` as a big-endian integer, zero when the tag is absent.
pub fn value_of(attributes: &[Bytes], tag: [u8; 4]) -> Result<U256, PaymasterError> {
    let Some(attribute) = attributes.iter().find(|attribute| has_tag(attribute, tag)) else {
        return Ok(U256::zero());
    };
    let tokens = decode(&[ParamType::Uint(256)], &attribute[4..]).map_err(|e| {
        PaymasterError::InvalidParameters(format!("attribute 0x{}: {}", hex::encode(tag), e))
    })?;
    match tokens.as_slice() {
        [Token::Uint(value)] => Ok(*value),
        _ => Err(PaymasterError::InvalidParameters(format!(
            "attribute 0x{} is not a uint256",
            hex::encode(tag)
        ))),
    }
}

/// Builds an attribute blob from a selector and its encoded arguments.
pub fn encode_attribute(tag: [u8; 4], args: &[u8]) -> Bytes {
    let mut data = Vec::with_capacity(4 + args.len());
    data.extend_from_slice(&tag);
    data.extend_from_slice(args);
    Bytes::from(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::encode;
    use ethers::types::Address;

    fn value_attribute(tag: [u8; 4], value: u64) -> Bytes {
        encode_attribute(tag, &encode(&[Token::Uint(U256::from(value))]))
    }

    #[test]
    fn locate_returns_first_match() {
        let tag = magic_spend_request_selector();
        let attributes = vec![
            encode_attribute(reward_selector(), &[1u8; 64]),
            value_attribute(tag, 7),
            value_attribute(tag, 9),
        ];

        assert_eq!(locate(&attributes, tag).unwrap(), &attributes[1]);
    }

    #[test]
    fn locate_fails_with_missing_tag() {
        let attributes = vec![encode_attribute(reward_selector(), &[0u8; 64])];

        let err = locate(&attributes, precheck_selector()).unwrap_err();
        assert_eq!(err, PaymasterError::AttributeNotFound(precheck_selector()));
    }

    #[test]
    fn unchecked_falls_back_to_first_element() {
        let attributes = vec![
            encode_attribute(reward_selector(), &[0u8; 64]),
            value_attribute(magic_spend_request_selector(), 1),
        ];

        let (found, attribute) = locate_unchecked(&attributes, precheck_selector());
        assert!(!found);
        assert_eq!(attribute, Some(&attributes[0]));

        let (found, attribute) = locate_unchecked(&attributes, magic_spend_request_selector());
        assert!(found);
        assert_eq!(attribute, Some(&attributes[1]));

        assert_eq!(locate_unchecked(&[], precheck_selector()), (false, None));
    }

    #[test]
    fn value_of_defaults_to_zero() {
        let hook = Address::repeat_byte(0x11);
        let attributes = vec![encode_attribute(
            precheck_selector(),
            &encode(&[Token::Address(hook)]),
        )];

        assert_eq!(
            value_of(&attributes, magic_spend_request_selector()).unwrap(),
            U256::zero()
        );

        let attributes = vec![value_attribute(magic_spend_request_selector(), 1_000)];
        assert_eq!(
            value_of(&attributes, magic_spend_request_selector()).unwrap(),
            U256::from(1_000)
        );
    }

    #[test]
    fn value_of_reads_first_word() {
        let tag = magic_spend_request_selector();
        let mut args = encode(&[Token::Uint(U256::from(42))]);
        args.extend_from_slice(&[0xff; 32]);
        let attributes = vec![encode_attribute(tag, &args)];

        assert_eq!(value_of(&attributes, tag).unwrap(), U256::from(42));
    }

    #[test]
    fn value_of_rejects_truncated_word() {
        let tag = magic_spend_request_selector();
        let attributes = vec![encode_attribute(tag, &[0x01; 8])];

        assert!(matches!(
            value_of(&attributes, tag),
            Err(PaymasterError::InvalidParameters(_))
        ));
    }

    #[test]
    fn short_blobs_never_match() {
        let attributes = vec![Bytes::from(vec![0xaa, 0xbb])];
        assert!(locate(&attributes, [0xaa, 0xbb, 0, 0]).is_err());
    }
}
