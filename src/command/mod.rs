mod address;
mod data_reply;
mod data_request;
mod diag_data;
mod firmware_master;
mod firmware_reply;
mod generic;
mod input;
mod ip_prog;
mod ip_prog_reply;
mod nzs;
mod output;
mod poll;
mod poll_reply;
mod rdm;
mod rdm_sub;
mod sync;
mod text_command;
mod timecode;
mod tod_control;
mod tod_data;
mod tod_request;
mod trigger;

use crate::{Error, Result};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

pub use self::address::{Address, PROGRAM_BIT, RESET_TO_DEFAULT};
pub use self::data_reply::DataReply;
pub use self::data_request::{request_code, DataRequest};
pub use self::diag_data::{DiagData, DiagPriority};
pub use self::firmware_master::{AlignedData, BlockType, FirmwareMaster};
pub use self::firmware_reply::{FirmwareReply, FirmwareReplyStatus};
pub use self::generic::GenericPacket;
pub use self::input::Input;
pub use self::ip_prog::{IpProg, IpProgCommand};
pub use self::ip_prog_reply::{IpProgReply, IP_PROG_STATUS_DHCP};
pub use self::nzs::{wrap_add_checksum, Nzs, StartCode, Vlc, VLC_MAGIC, VLC_START_CODE};
pub use self::output::Output;
pub use self::poll::Poll;
pub use self::poll_reply::PollReply;
pub use self::rdm::{
    Rdm, RdmCommandClass, RDM_COMMAND_CLASS_OFFSET, RDM_MAX_PAYLOAD, RDM_MIN_PAYLOAD,
};
pub use self::rdm_sub::RdmSub;
pub use self::sync::Sync;
pub use self::text_command::Command;
pub use self::timecode::{FrameType, Timecode};
pub use self::tod_control::{TodControl, TodControlCommand};
pub use self::tod_data::{TodData, TOD_DATA_MAX_UIDS, TOD_FULL, TOD_NAK};
pub use self::tod_request::TodRequest;
pub use self::trigger::{Trigger, TriggerKey};

/// The ArtNet header. This is the first 8 bytes of each message, and contains the text "Art-Net\0"
pub const ARTNET_HEADER: &[u8; 8] = b"Art-Net\0";

/// The protocol version, 14 for Art-Net 4. Lower versions still parse because
/// the protocol is guaranteed to be backwards-compatible.
pub const ARTNET_PROTOCOL_VERSION: [u8; 2] = [0, 14];

/// The default Art-Net UDP port, 0x1936
pub const ARTNET_PORT: u16 = 6454;

/// One decoded Art-Net packet of any opcode.
///
/// This enum implements a `write_to_buffer` and `from_buffer` function, to be used with UDP connections.
#[derive(Debug, Clone, PartialEq)]
pub enum ArtCommand {
    /// A poll command, used to discover devices on the network
    Poll(Poll),

    /// A reply to the poll command, it contains device status information
    PollReply(Box<PollReply>),

    /// Diagnostics and data logging packet
    DiagData(DiagData),

    /// Text based parameter directives
    Command(Command),

    /// A request for product detail such as URLs
    DataRequest(DataRequest),

    /// The answer to a DataRequest
    DataReply(DataReply),

    /// An ArtDmx data packet, carrying one universe of DMX512 data
    Output(Output),

    /// A non-zero start code DMX512 frame, also the transport for ArtVlc
    Nzs(Nzs),

    /// Forces synchronous transfer of previously buffered ArtDmx packets
    Sync(Sync),

    /// Remote programming of node identity and port configuration
    Address(Box<Address>),

    /// Enable or disable DMX inputs
    Input(Input),

    /// A request for a port's RDM Table of Devices
    TodRequest(TodRequest),

    /// A port's RDM Table of Devices, in blocks of up to 200 UIDs
    TodData(TodData),

    /// RDM discovery control messages
    TodControl(TodControl),

    /// A non-discovery RDM message
    Rdm(Rdm),

    /// Compressed RDM sub-device data
    RdmSub(RdmSub),

    /// [Opaque] Video screen setup for nodes implementing extended video
    VideoSetup(GenericPacket),

    /// [Opaque] Colour palette setup for nodes implementing extended video
    VideoPalette(GenericPacket),

    /// [Opaque] Display data for nodes implementing extended video
    VideoData(GenericPacket),

    /// [Opaque] This packet is deprecated
    MacMaster(GenericPacket),

    /// [Opaque] This packet is deprecated
    MacSlave(GenericPacket),

    /// One block of a firmware or UBEA upload
    FirmwareMaster(Box<FirmwareMaster>),

    /// Acknowledges a firmware block
    FirmwareReply(FirmwareReply),

    /// [Opaque] Uploads user file to node
    FileTnMaster(GenericPacket),

    /// [Opaque] Downloads user file from node
    FileFnMaster(GenericPacket),

    /// [Opaque] Server to Node acknowledge for download packets
    FileFnReply(GenericPacket),

    /// Reprogrammes the IP, netmask and gateway of a node
    IpProg(IpProg),

    /// Mirrors the node's network configuration after an IpProg
    IpProgReply(IpProgReply),

    /// [Opaque] Unicast by a Media Server and acted upon by a Controller
    Media(GenericPacket),

    /// [Opaque] Unicast by a Controller and acted upon by a Media Server
    MediaPatch(GenericPacket),

    /// [Opaque] Unicast by a Controller and acted upon by a Media Server
    MediaControl(GenericPacket),

    /// [Opaque] Unicast by a Media Server and acted upon by a Controller
    MediaControlReply(GenericPacket),

    /// Transports time code over the network
    Timecode(Timecode),

    /// [Opaque] Used to synchronise real time date and clock
    TimeSync(GenericPacket),

    /// A remote trigger macro
    Trigger(Trigger),

    /// [Opaque] Requests a node's file list
    Directory(GenericPacket),

    /// [Opaque] Replies to Directory with file list
    DirectoryReply(GenericPacket),
}

impl ArtCommand {
    /// Convert an ArtCommand into a byte buffer, which can be sent to a UDP socket
    pub fn write_to_buffer(&self) -> Result<Vec<u8>> {
        let mut result = Vec::new();
        let (opcode, data) = self.get_opcode()?;

        // Append Art-Net\0 header
        result.extend_from_slice(ARTNET_HEADER);
        // Append the opcode of this enum
        result
            .write_u16::<LittleEndian>(opcode)
            .map_err(Error::CursorEof)?;

        result.extend_from_slice(&data);

        Ok(result)
    }

    /// Convert a byte buffer to a command
    pub fn from_buffer(buffer: &[u8]) -> Result<ArtCommand> {
        const MIN_BUFFER_LENGTH: usize = 12;

        if buffer.len() < MIN_BUFFER_LENGTH {
            return Err(Error::MessageTooShort {
                message: buffer.to_vec(),
                min_len: MIN_BUFFER_LENGTH,
            });
        }

        if !buffer.starts_with(ARTNET_HEADER) {
            return Err(Error::InvalidArtnetHeader(buffer.to_vec()));
        }

        let opcode = LittleEndian::read_u16(&buffer[8..10]);
        let remaining = &buffer[10..];

        ArtCommand::opcode_to_enum(opcode, remaining)
    }

    /// The wire opcode of this command
    pub fn opcode(&self) -> u16 {
        // get_opcode only fails while encoding a body, the opcode itself is
        // total
        match self {
            ArtCommand::Poll(_) => 0x2000,
            ArtCommand::PollReply(_) => 0x2100,
            ArtCommand::DiagData(_) => 0x2300,
            ArtCommand::Command(_) => 0x2400,
            ArtCommand::DataRequest(_) => 0x2700,
            ArtCommand::DataReply(_) => 0x2800,
            ArtCommand::Output(_) => 0x5000,
            ArtCommand::Nzs(_) => 0x5100,
            ArtCommand::Sync(_) => 0x5200,
            ArtCommand::Address(_) => 0x6000,
            ArtCommand::Input(_) => 0x7000,
            ArtCommand::TodRequest(_) => 0x8000,
            ArtCommand::TodData(_) => 0x8100,
            ArtCommand::TodControl(_) => 0x8200,
            ArtCommand::Rdm(_) => 0x8300,
            ArtCommand::RdmSub(_) => 0x8400,
            ArtCommand::Media(_) => 0x9000,
            ArtCommand::MediaPatch(_) => 0x9100,
            ArtCommand::MediaControl(_) => 0x9200,
            ArtCommand::MediaControlReply(_) => 0x9300,
            ArtCommand::Timecode(_) => 0x9700,
            ArtCommand::TimeSync(_) => 0x9800,
            ArtCommand::Trigger(_) => 0x9900,
            ArtCommand::Directory(_) => 0x9A00,
            ArtCommand::DirectoryReply(_) => 0x9B00,
            ArtCommand::VideoSetup(_) => 0xA010,
            ArtCommand::VideoPalette(_) => 0xA020,
            ArtCommand::VideoData(_) => 0xA040,
            ArtCommand::MacMaster(_) => 0xF000,
            ArtCommand::MacSlave(_) => 0xF100,
            ArtCommand::FirmwareMaster(_) => 0xF200,
            ArtCommand::FirmwareReply(_) => 0xF300,
            ArtCommand::FileTnMaster(_) => 0xF400,
            ArtCommand::FileFnMaster(_) => 0xF500,
            ArtCommand::FileFnReply(_) => 0xF600,
            ArtCommand::IpProg(_) => 0xF800,
            ArtCommand::IpProgReply(_) => 0xF900,
        }
    }

    /// Whether this command may legally be broadcast.
    ///
    /// ArtPollReply, ArtDmx, ArtRdm and ArtTodData are unicast-only;
    /// broadcasting them is a spec violation the shell refuses to commit.
    pub fn broadcast_allowed(&self) -> bool {
        !matches!(
            self,
            ArtCommand::PollReply(_)
                | ArtCommand::Output(_)
                | ArtCommand::Rdm(_)
                | ArtCommand::TodData(_)
        )
    }

    fn opcode_to_enum(code: u16, data: &[u8]) -> Result<ArtCommand> {
        macro_rules! parse {
            ($name:ident, $ty:ty) => {
                ArtCommand::$name(
                    <$ty>::from(data)
                        .map_err(|e| Error::OpcodeError(stringify!($name), Box::new(e)))?,
                )
            };
            (boxed $name:ident, $ty:ty) => {
                ArtCommand::$name(Box::new(
                    <$ty>::from(data)
                        .map_err(|e| Error::OpcodeError(stringify!($name), Box::new(e)))?,
                ))
            };
        }

        Ok(match code {
            0x2000 => parse!(Poll, Poll),
            0x2100 => parse!(boxed PollReply, PollReply),
            0x2300 => parse!(DiagData, DiagData),
            0x2400 => parse!(Command, Command),
            0x2700 => parse!(DataRequest, DataRequest),
            0x2800 => parse!(DataReply, DataReply),
            0x5000 => parse!(Output, Output),
            0x5100 => parse!(Nzs, Nzs),
            0x5200 => parse!(Sync, Sync),
            0x6000 => parse!(boxed Address, Address),
            0x7000 => parse!(Input, Input),
            0x8000 => parse!(TodRequest, TodRequest),
            0x8100 => parse!(TodData, TodData),
            0x8200 => parse!(TodControl, TodControl),
            0x8300 => parse!(Rdm, Rdm),
            0x8400 => parse!(RdmSub, RdmSub),
            0x9000 => parse!(Media, GenericPacket),
            0x9100 => parse!(MediaPatch, GenericPacket),
            0x9200 => parse!(MediaControl, GenericPacket),
            0x9300 => parse!(MediaControlReply, GenericPacket),
            0x9700 => parse!(Timecode, Timecode),
            0x9800 => parse!(TimeSync, GenericPacket),
            0x9900 => parse!(Trigger, Trigger),
            0x9A00 => parse!(Directory, GenericPacket),
            0x9B00 => parse!(DirectoryReply, GenericPacket),
            0xA010 => parse!(VideoSetup, GenericPacket),
            0xA020 => parse!(VideoPalette, GenericPacket),
            0xA040 => parse!(VideoData, GenericPacket),
            0xF000 => parse!(MacMaster, GenericPacket),
            0xF100 => parse!(MacSlave, GenericPacket),
            0xF200 => parse!(boxed FirmwareMaster, FirmwareMaster),
            0xF300 => parse!(FirmwareReply, FirmwareReply),
            0xF400 => parse!(FileTnMaster, GenericPacket),
            0xF500 => parse!(FileFnMaster, GenericPacket),
            0xF600 => parse!(FileFnReply, GenericPacket),
            0xF800 => parse!(IpProg, IpProg),
            0xF900 => parse!(IpProgReply, IpProgReply),
            _ => return Err(Error::UnknownOpcode(code)),
        })
    }

    fn get_opcode(&self) -> Result<(u16, Vec<u8>)> {
        let body = match self {
            ArtCommand::Poll(poll) => poll.to_bytes()?,
            ArtCommand::PollReply(reply) => reply.to_bytes()?,
            ArtCommand::DiagData(diag) => diag.to_bytes()?,
            ArtCommand::Command(command) => command.to_bytes()?,
            ArtCommand::DataRequest(request) => request.to_bytes()?,
            ArtCommand::DataReply(reply) => reply.to_bytes()?,
            ArtCommand::Output(output) => output.to_bytes()?,
            ArtCommand::Nzs(nzs) => nzs.to_bytes()?,
            ArtCommand::Sync(sync) => sync.to_bytes()?,
            ArtCommand::Address(address) => address.to_bytes()?,
            ArtCommand::Input(input) => input.to_bytes()?,
            ArtCommand::TodRequest(request) => request.to_bytes()?,
            ArtCommand::TodData(data) => data.to_bytes()?,
            ArtCommand::TodControl(control) => control.to_bytes()?,
            ArtCommand::Rdm(rdm) => rdm.to_bytes()?,
            ArtCommand::RdmSub(sub) => sub.to_bytes()?,
            ArtCommand::Media(generic)
            | ArtCommand::MediaPatch(generic)
            | ArtCommand::MediaControl(generic)
            | ArtCommand::MediaControlReply(generic)
            | ArtCommand::TimeSync(generic)
            | ArtCommand::Directory(generic)
            | ArtCommand::DirectoryReply(generic)
            | ArtCommand::VideoSetup(generic)
            | ArtCommand::VideoPalette(generic)
            | ArtCommand::VideoData(generic)
            | ArtCommand::MacMaster(generic)
            | ArtCommand::MacSlave(generic)
            | ArtCommand::FileTnMaster(generic)
            | ArtCommand::FileFnMaster(generic)
            | ArtCommand::FileFnReply(generic) => generic.to_bytes()?,
            ArtCommand::Timecode(timecode) => timecode.to_bytes()?,
            ArtCommand::Trigger(trigger) => trigger.to_bytes()?,
            ArtCommand::FirmwareMaster(master) => master.to_bytes()?,
            ArtCommand::FirmwareReply(reply) => reply.to_bytes()?,
            ArtCommand::IpProg(prog) => prog.to_bytes()?,
            ArtCommand::IpProgReply(reply) => reply.to_bytes()?,
        };
        Ok((self.opcode(), body))
    }
}
