//! Control event wire formats.
//!
//! Each control queue stores fixed-size slots. A slot is split into a header
//! lane (always present) and an optional value lane laid out after all header
//! slots, so the effect queue can keep its integer triples and float values in
//! two parallel arrays while MIDI and sampler events stay packed.

/// An event that can be stored in a [`crate::QueueWriter`] slot.
pub trait WireEvent: Copy + Sized {
    /// Bytes per slot in the header lane.
    const HEADER_BYTES: usize;
    /// Bytes per slot in the value lane (0 for packed events).
    const VALUE_BYTES: usize;
    /// Total bytes one slot occupies in the queue payload.
    const SLOT_BYTES: usize = Self::HEADER_BYTES + Self::VALUE_BYTES;

    fn encode(&self, header: &mut [u8], value: &mut [u8]);

    /// `None` if the slot holds an unknown discriminant.
    fn decode(header: &[u8], value: &[u8]) -> Option<Self>;
}

/// MIDI note event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NoteKind {
    NoteOff = 0,
    NoteOn = 1,
}

impl NoteKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::NoteOff),
            1 => Some(Self::NoteOn),
            _ => None,
        }
    }
}

/// MIDI note event: `[event_type, note, velocity, 0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub kind: NoteKind,
    pub note: u8,
    pub velocity: u8,
}

impl NoteEvent {
    pub fn note_on(note: u8, velocity: u8) -> Self {
        Self {
            kind: NoteKind::NoteOn,
            note,
            velocity,
        }
    }

    pub fn note_off(note: u8) -> Self {
        Self {
            kind: NoteKind::NoteOff,
            note,
            velocity: 0,
        }
    }

    /// A note-on with velocity 0 counts as a note-off.
    #[inline]
    pub fn is_note_on(&self) -> bool {
        self.kind == NoteKind::NoteOn && self.velocity > 0
    }
}

impl WireEvent for NoteEvent {
    const HEADER_BYTES: usize = 4;
    const VALUE_BYTES: usize = 0;

    fn encode(&self, header: &mut [u8], _value: &mut [u8]) {
        header[0] = self.kind as u8;
        header[1] = self.note;
        header[2] = self.velocity;
        header[3] = 0;
    }

    fn decode(header: &[u8], _value: &[u8]) -> Option<Self> {
        Some(Self {
            kind: NoteKind::from_u8(header[0])?,
            note: header[1],
            velocity: header[2],
        })
    }
}

/// Sampler (oscillator) parameter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ParamKey {
    None = 0,
    Attack = 1,
    Release = 2,
    Decay = 3,
    Sustain = 4,
    Gain = 5,
    Delay = 6,
    Pitch = 7,
    Phase = 8,
    SampleId = 9,
    Pan = 10,
}

impl ParamKey {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::None,
            1 => Self::Attack,
            2 => Self::Release,
            3 => Self::Decay,
            4 => Self::Sustain,
            5 => Self::Gain,
            6 => Self::Delay,
            7 => Self::Pitch,
            8 => Self::Phase,
            9 => Self::SampleId,
            10 => Self::Pan,
            _ => return None,
        })
    }

    /// Keys whose value is given in milliseconds and stored in samples.
    pub fn is_duration(self) -> bool {
        matches!(
            self,
            Self::Attack | Self::Decay | Self::Release | Self::Delay
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SamplerEventKind {
    Add = 0,
    Remove = 1,
    Update = 2,
}

impl SamplerEventKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Add),
            1 => Some(Self::Remove),
            2 => Some(Self::Update),
            _ => None,
        }
    }
}

/// Sampler event: `[event_type, target_index, param_key, f32 value (LE)]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerEvent {
    pub kind: SamplerEventKind,
    pub target_index: u8,
    pub key: ParamKey,
    pub value: f32,
}

impl SamplerEvent {
    pub fn add(target_index: u8) -> Self {
        Self {
            kind: SamplerEventKind::Add,
            target_index,
            key: ParamKey::None,
            value: 0.0,
        }
    }

    pub fn remove(target_index: u8) -> Self {
        Self {
            kind: SamplerEventKind::Remove,
            target_index,
            key: ParamKey::None,
            value: 0.0,
        }
    }

    pub fn update(target_index: u8, key: ParamKey, value: f32) -> Self {
        Self {
            kind: SamplerEventKind::Update,
            target_index,
            key,
            value,
        }
    }
}

impl WireEvent for SamplerEvent {
    const HEADER_BYTES: usize = 8;
    const VALUE_BYTES: usize = 0;

    fn encode(&self, header: &mut [u8], _value: &mut [u8]) {
        header[0] = self.kind as u8;
        header[1] = self.target_index;
        header[2] = self.key as u8;
        header[3..7].copy_from_slice(&self.value.to_le_bytes());
        header[7] = 0;
    }

    fn decode(header: &[u8], _value: &[u8]) -> Option<Self> {
        let mut value = [0u8; 4];
        value.copy_from_slice(&header[3..7]);
        Some(Self {
            kind: SamplerEventKind::from_u8(header[0])?,
            target_index: header[1],
            key: ParamKey::from_u8(header[2])?,
            value: f32::from_le_bytes(value),
        })
    }
}

/// Effect processor type, sent as the `param_index` of an add event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EffectKind {
    Echo = 0,
    Filter = 1,
}

impl EffectKind {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Echo),
            1 => Some(Self::Filter),
            _ => None,
        }
    }
}

impl From<EffectKind> for u32 {
    fn from(kind: EffectKind) -> Self {
        kind as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EchoParam {
    Delay = 0,
    Feedback = 1,
    RDelayOffset = 2,
    LDelayOffset = 3,
    Dry = 4,
    Wet = 5,
}

impl From<EchoParam> for u32 {
    fn from(param: EchoParam) -> Self {
        param as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum FilterParam {
    Frequency = 0,
    Q = 1,
    Type = 2,
    Gain = 3,
}

impl From<FilterParam> for u32 {
    fn from(param: FilterParam) -> Self {
        param as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EffectEventKind {
    Add = 0,
    Remove = 1,
    Edit = 2,
}

impl EffectEventKind {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Add),
            1 => Some(Self::Remove),
            2 => Some(Self::Edit),
            _ => None,
        }
    }
}

/// Effect event: int32 lane `[target_id, event_type, param_index]` plus a
/// parallel float32 lane holding `value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectEvent {
    pub target_id: u32,
    pub kind: EffectEventKind,
    pub param_index: u32,
    pub value: f32,
}

impl EffectEvent {
    pub fn add(target_id: u32, kind: EffectKind) -> Self {
        Self {
            target_id,
            kind: EffectEventKind::Add,
            param_index: kind.into(),
            value: 0.0,
        }
    }

    pub fn remove(target_id: u32) -> Self {
        Self {
            target_id,
            kind: EffectEventKind::Remove,
            param_index: 0,
            value: 0.0,
        }
    }

    pub fn edit(target_id: u32, param_index: u32, value: f32) -> Self {
        Self {
            target_id,
            kind: EffectEventKind::Edit,
            param_index,
            value,
        }
    }

    /// Effect type of an add event.
    pub fn effect_kind(&self) -> Option<EffectKind> {
        match self.kind {
            EffectEventKind::Add => EffectKind::from_u32(self.param_index),
            _ => None,
        }
    }
}

impl WireEvent for EffectEvent {
    const HEADER_BYTES: usize = 12;
    const VALUE_BYTES: usize = 4;

    fn encode(&self, header: &mut [u8], value: &mut [u8]) {
        header[0..4].copy_from_slice(&(self.target_id as i32).to_le_bytes());
        header[4..8].copy_from_slice(&(self.kind as i32).to_le_bytes());
        header[8..12].copy_from_slice(&(self.param_index as i32).to_le_bytes());
        value[0..4].copy_from_slice(&self.value.to_le_bytes());
    }

    fn decode(header: &[u8], value: &[u8]) -> Option<Self> {
        let word = |bytes: &[u8]| {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes[..4]);
            buf
        };
        Some(Self {
            target_id: i32::from_le_bytes(word(&header[0..4])) as u32,
            kind: EffectEventKind::from_u32(i32::from_le_bytes(word(&header[4..8])) as u32)?,
            param_index: i32::from_le_bytes(word(&header[8..12])) as u32,
            value: f32::from_le_bytes(word(value)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_wire_layout() {
        let mut slot = [0xffu8; 4];
        NoteEvent::note_on(60, 100).encode(&mut slot, &mut []);
        assert_eq!(slot, [1, 60, 100, 0]);

        NoteEvent::note_off(60).encode(&mut slot, &mut []);
        assert_eq!(slot, [0, 60, 0, 0]);
    }

    #[test]
    fn test_note_on_zero_velocity_is_off() {
        assert!(NoteEvent::note_on(60, 1).is_note_on());
        assert!(!NoteEvent::note_on(60, 0).is_note_on());
        assert!(!NoteEvent::note_off(60).is_note_on());
    }

    #[test]
    fn test_sampler_value_is_little_endian_at_byte_3() {
        let mut slot = [0u8; 8];
        SamplerEvent::update(4, ParamKey::Gain, 1.5).encode(&mut slot, &mut []);
        assert_eq!(slot[0], 2);
        assert_eq!(slot[1], 4);
        assert_eq!(slot[2], 5);
        assert_eq!(&slot[3..7], &1.5f32.to_le_bytes());

        let decoded = SamplerEvent::decode(&slot, &[]).unwrap();
        assert_eq!(decoded.key, ParamKey::Gain);
        assert_eq!(decoded.value, 1.5);
    }

    #[test]
    fn test_effect_lanes() {
        let mut header = [0u8; 12];
        let mut value = [0u8; 4];
        EffectEvent::edit(3, EchoParam::Wet.into(), 0.25).encode(&mut header, &mut value);
        assert_eq!(&header[0..4], &3i32.to_le_bytes());
        assert_eq!(&header[4..8], &2i32.to_le_bytes());
        assert_eq!(&header[8..12], &5i32.to_le_bytes());
        assert_eq!(value, 0.25f32.to_le_bytes());
    }

    #[test]
    fn test_effect_add_carries_kind() {
        let event = EffectEvent::add(0, EffectKind::Filter);
        assert_eq!(event.param_index, 1);
        assert_eq!(event.effect_kind(), Some(EffectKind::Filter));
        assert_eq!(EffectEvent::remove(0).effect_kind(), None);
    }

    #[test]
    fn test_unknown_discriminants_rejected() {
        assert!(NoteEvent::decode(&[7, 60, 1, 0], &[]).is_none());
        assert!(SamplerEvent::decode(&[0, 0, 42, 0, 0, 0, 0, 0], &[]).is_none());
        let mut header = [0u8; 12];
        header[4] = 9;
        assert!(EffectEvent::decode(&header, &[0; 4]).is_none());
    }

    #[test]
    fn test_duration_keys() {
        assert!(ParamKey::Attack.is_duration());
        assert!(ParamKey::Delay.is_duration());
        assert!(!ParamKey::Pitch.is_duration());
        assert!(!ParamKey::Gain.is_duration());
    }
}
