//! ZFM protocol command definitions

use std::fmt;

use crate::error::{Error, Result};

/// Protocol command codes
///
/// The opcode travels as the first payload byte of a command packet.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    // System
    AddressSet = 0x15,
    PasswordSet = 0x12,
    PasswordVerify = 0x13,
    ParametersSet = 0x0E,
    ParametersGet = 0x0F,
    Handshake = 0x53,

    // Image
    ImageCapture = 0x01,
    ImageCaptureFree = 0x52,
    ImageConvert = 0x02,
    ImageUpload = 0x0B,
    ImageDownload = 0x0A,

    // Template
    TemplateMatch = 0x03,
    TemplateSearch = 0x04,
    TemplateSearchFast = 0x1B,
    TemplateCreate = 0x05,
    TemplateSave = 0x06,
    TemplateLoad = 0x07,
    TemplateUpload = 0x09,
    TemplateDownload = 0x08,
    TemplateDelete = 0x0C,
    TemplateEmpty = 0x0D,
    TemplateCount = 0x1D,
    TemplateIndex = 0x1F,

    // Extras
    NotepadSet = 0x18,
    NotepadGet = 0x19,
    GenerateRandom = 0x14,
    BacklightOn = 0x50,
    BacklightOff = 0x51,
}

impl Command {
    /// Check if this command is followed by a host-to-device data stream
    pub fn sends_data(self) -> bool {
        matches!(self, Self::ImageUpload | Self::TemplateUpload)
    }

    /// Check if this command is answered with a device-to-host data stream
    pub fn receives_data(self) -> bool {
        matches!(self, Self::ImageDownload | Self::TemplateDownload)
    }

    /// Get command name
    pub fn name(self) -> &'static str {
        match self {
            Self::AddressSet => "ADDRESS_SET",
            Self::PasswordSet => "PASSWORD_SET",
            Self::PasswordVerify => "PASSWORD_VERIFY",
            Self::ParametersSet => "PARAMETERS_SET",
            Self::ParametersGet => "PARAMETERS_GET",
            Self::Handshake => "HANDSHAKE",
            Self::ImageCapture => "IMAGE_CAPTURE",
            Self::ImageCaptureFree => "IMAGE_CAPTURE_FREE",
            Self::ImageConvert => "IMAGE_CONVERT",
            Self::ImageUpload => "IMAGE_UPLOAD",
            Self::ImageDownload => "IMAGE_DOWNLOAD",
            Self::TemplateMatch => "TEMPLATE_MATCH",
            Self::TemplateSearch => "TEMPLATE_SEARCH",
            Self::TemplateSearchFast => "TEMPLATE_SEARCH_FAST",
            Self::TemplateCreate => "TEMPLATE_CREATE",
            Self::TemplateSave => "TEMPLATE_SAVE",
            Self::TemplateLoad => "TEMPLATE_LOAD",
            Self::TemplateUpload => "TEMPLATE_UPLOAD",
            Self::TemplateDownload => "TEMPLATE_DOWNLOAD",
            Self::TemplateDelete => "TEMPLATE_DELETE",
            Self::TemplateEmpty => "TEMPLATE_EMPTY",
            Self::TemplateCount => "TEMPLATE_COUNT",
            Self::TemplateIndex => "TEMPLATE_INDEX",
            Self::NotepadSet => "NOTEPAD_SET",
            Self::NotepadGet => "NOTEPAD_GET",
            Self::GenerateRandom => "GENERATE_RANDOM",
            Self::BacklightOn => "BACKLIGHT_ON",
            Self::BacklightOff => "BACKLIGHT_OFF",
        }
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> u8 {
        cmd as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x15 => Ok(Self::AddressSet),
            0x12 => Ok(Self::PasswordSet),
            0x13 => Ok(Self::PasswordVerify),
            0x0E => Ok(Self::ParametersSet),
            0x0F => Ok(Self::ParametersGet),
            0x53 => Ok(Self::Handshake),
            0x01 => Ok(Self::ImageCapture),
            0x52 => Ok(Self::ImageCaptureFree),
            0x02 => Ok(Self::ImageConvert),
            0x0B => Ok(Self::ImageUpload),
            0x0A => Ok(Self::ImageDownload),
            0x03 => Ok(Self::TemplateMatch),
            0x04 => Ok(Self::TemplateSearch),
            0x1B => Ok(Self::TemplateSearchFast),
            0x05 => Ok(Self::TemplateCreate),
            0x06 => Ok(Self::TemplateSave),
            0x07 => Ok(Self::TemplateLoad),
            0x09 => Ok(Self::TemplateUpload),
            0x08 => Ok(Self::TemplateDownload),
            0x0C => Ok(Self::TemplateDelete),
            0x0D => Ok(Self::TemplateEmpty),
            0x1D => Ok(Self::TemplateCount),
            0x1F => Ok(Self::TemplateIndex),
            0x18 => Ok(Self::NotepadSet),
            0x19 => Ok(Self::NotepadGet),
            0x14 => Ok(Self::GenerateRandom),
            0x50 => Ok(Self::BacklightOn),
            0x51 => Ok(Self::BacklightOff),
            _ => Err(Error::UnknownCommand(value)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}
