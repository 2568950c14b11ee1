//! Property tests for the wire layer: arbitrary envelopes and invocations
//! survive a marshal/unmarshal round trip byte-exactly, batched payloads
//! decode in order, truncation is always rejected, and the varint encodes
//! at its minimal width.

use proptest::prelude::*;
use replink::{
    ActorRmi, AspectMask, ChannelId, Envelope, LegacyRmi, NetEntityId, RepId, RmiInvocation,
    RmiTarget, ScriptRmi, SpawnParams,
};
use replink_serde::{ReadBuffer, Serde, VarU32, WriteBuffer};

fn channel_strategy() -> impl Strategy<Value = ChannelId> {
    (1u32..16).prop_map(ChannelId)
}

fn net_id_strategy() -> impl Strategy<Value = NetEntityId> {
    any::<u32>().prop_map(NetEntityId)
}

fn aspect_mask_strategy() -> impl Strategy<Value = AspectMask> {
    (0u32..=AspectMask::ALL.bits()).prop_map(AspectMask::from_bits)
}

fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..48)
}

/// Selector combinations a caller can legally construct. Origin and filter
/// ride the wire only for some of them, so the strategies below fill those
/// fields only where the selector keeps them.
fn target_strategy() -> impl Strategy<Value = RmiTarget> {
    prop_oneof![
        Just(RmiTarget::TO_SERVER),
        Just(RmiTarget::TO_SERVER | RmiTarget::NO_LOCAL_CALLS),
        Just(RmiTarget::TO_ALL_CLIENTS),
        Just(RmiTarget::TO_REMOTE_CLIENTS),
        Just(RmiTarget::TO_OWNING_CLIENT),
        Just(RmiTarget::TO_CLIENT_CHANNEL),
        Just(RmiTarget::TO_OTHER_CLIENTS),
        Just(RmiTarget::TO_OTHER_REMOTE_CLIENTS),
    ]
}

fn legacy_strategy() -> impl Strategy<Value = LegacyRmi> {
    (
        target_strategy(),
        channel_strategy(),
        channel_strategy(),
        1u32..10_000,
        payload_strategy(),
    )
        .prop_map(|(target, filter, origin, rep, params)| {
            let filter = if target.requires_filter() {
                filter
            } else {
                ChannelId::INVALID
            };
            let mut rmi = LegacyRmi::new(target, filter, RepId(rep), &params);
            if target.requires_origin() {
                rmi.origin = origin;
            }
            rmi
        })
}

fn actor_strategy() -> impl Strategy<Value = ActorRmi> {
    (legacy_strategy(), any::<u8>()).prop_map(|(rmi, extension_id)| {
        let mut actor = ActorRmi::new(
            rmi.target,
            rmi.filter,
            rmi.rep_id,
            extension_id,
            rmi.payload.as_slice(),
        );
        actor.origin = rmi.origin;
        actor
    })
}

fn script_strategy() -> impl Strategy<Value = ScriptRmi> {
    (
        target_strategy(),
        channel_strategy(),
        channel_strategy(),
        payload_strategy(),
    )
        .prop_map(|(target, to, avoid, data)| ScriptRmi::new(target, to, avoid, &data))
}

fn invocation_strategy() -> impl Strategy<Value = RmiInvocation> {
    prop_oneof![
        legacy_strategy().prop_map(RmiInvocation::Legacy),
        actor_strategy().prop_map(RmiInvocation::Actor),
        script_strategy().prop_map(RmiInvocation::Script),
    ]
}

fn spawn_params_strategy() -> impl Strategy<Value = SpawnParams> {
    (
        "[a-z_]{0,12}",
        "[A-Za-z]{1,10}",
        "[a-z_]{0,8}",
        prop::array::uniform3(-1000.0f32..1000.0),
        prop::array::uniform4(-1.0f32..1.0),
        prop::array::uniform3(0.1f32..10.0),
        0u32..4,
        0u32..8,
    )
        .prop_map(
            |(entity_name, class_name, archetype, position, orientation, scale, flags, owner)| {
                SpawnParams {
                    entity_name,
                    class_name,
                    archetype,
                    position,
                    orientation,
                    scale,
                    flags,
                    owner_channel: ChannelId(owner),
                }
            },
        )
}

fn envelope_strategy() -> impl Strategy<Value = Envelope> {
    prop_oneof![
        (net_id_strategy(), spawn_params_strategy())
            .prop_map(|(net_id, params)| Envelope::Spawn { net_id, params }),
        (net_id_strategy(), aspect_mask_strategy(), payload_strategy()).prop_map(
            |(net_id, aspects, body)| Envelope::AspectUpdate {
                net_id,
                aspects,
                body,
            }
        ),
        (net_id_strategy(), channel_strategy(), aspect_mask_strategy()).prop_map(
            |(net_id, owner, aspects)| Envelope::Authority {
                net_id,
                owner,
                aspects,
            }
        ),
        (net_id_strategy(), invocation_strategy())
            .prop_map(|(net_id, invocation)| Envelope::Rmi { net_id, invocation }),
        net_id_strategy().prop_map(|net_id| Envelope::Despawn { net_id }),
    ]
}

proptest! {
    #[test]
    fn prop_envelopes_round_trip(envelope in envelope_strategy()) {
        let mut writer = WriteBuffer::new();
        envelope.ser(&mut writer);
        let wire = writer.into_vec();

        let mut reader = ReadBuffer::new(&wire);
        let decoded = Envelope::de(&mut reader);
        prop_assert!(decoded.is_ok(), "decode failed: {:?}", decoded);
        prop_assert_eq!(decoded.unwrap(), envelope);
        prop_assert!(reader.is_exhausted());
    }

    #[test]
    fn prop_batched_envelopes_decode_in_order(
        envelopes in prop::collection::vec(envelope_strategy(), 1..6)
    ) {
        let mut writer = WriteBuffer::new();
        for envelope in &envelopes {
            envelope.ser(&mut writer);
        }
        let wire = writer.into_vec();

        let mut reader = ReadBuffer::new(&wire);
        let mut decoded = Vec::new();
        while !reader.is_exhausted() {
            match Envelope::de(&mut reader) {
                Ok(envelope) => decoded.push(envelope),
                Err(error) => prop_assert!(false, "decode failed: {:?}", error),
            }
        }
        prop_assert_eq!(decoded, envelopes);
    }

    #[test]
    fn prop_truncated_envelopes_are_rejected(
        envelope in envelope_strategy(),
        cut in 0usize..64
    ) {
        let mut writer = WriteBuffer::new();
        envelope.ser(&mut writer);
        let wire = writer.into_vec();

        // every strict prefix must fail; a decoder that invents trailing
        // fields would corrupt the rest of a batched payload
        let cut = cut % wire.len();
        let mut reader = ReadBuffer::new(&wire[..cut]);
        prop_assert!(Envelope::de(&mut reader).is_err());
    }

    #[test]
    fn prop_invocations_round_trip(invocation in invocation_strategy()) {
        let mut writer = WriteBuffer::new();
        invocation.marshal(&mut writer);
        let wire = writer.into_vec();

        let mut reader = ReadBuffer::new(&wire);
        let decoded = RmiInvocation::unmarshal(&mut reader);
        prop_assert!(decoded.is_ok(), "decode failed: {:?}", decoded);
        prop_assert_eq!(decoded.unwrap(), invocation);
        prop_assert!(reader.is_exhausted());
    }

    #[test]
    fn prop_aspect_masks_round_trip(mask in aspect_mask_strategy()) {
        let mut writer = WriteBuffer::new();
        mask.ser(&mut writer);
        let wire = writer.into_vec();

        let mut reader = ReadBuffer::new(&wire);
        let decoded = AspectMask::de(&mut reader);
        prop_assert!(decoded.is_ok());
        prop_assert_eq!(decoded.unwrap(), mask);
        prop_assert!(reader.is_exhausted());
    }

    #[test]
    fn prop_varints_round_trip_at_minimal_width(value in any::<u32>()) {
        let mut writer = WriteBuffer::new();
        VarU32::new(value).ser(&mut writer);
        let wire = writer.into_vec();

        let expected_len = match value {
            0..=0x7F => 1,
            0x80..=0x3FFF => 2,
            0x4000..=0x1F_FFFF => 3,
            0x20_0000..=0xFFF_FFFF => 4,
            _ => 5,
        };
        prop_assert_eq!(wire.len(), expected_len);

        let mut reader = ReadBuffer::new(&wire);
        let decoded = VarU32::de(&mut reader);
        prop_assert!(decoded.is_ok());
        prop_assert_eq!(decoded.unwrap().get(), value);
        prop_assert!(reader.is_exhausted());
    }
}
