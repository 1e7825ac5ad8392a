//! Resource templates found in `Buffer` bodies, as used by `_CRS`/`_PRS`.
//!
//! A buffer is only treated as a template if it's a sequence of well formed
//! descriptors ending with an End tag at the very end of the buffer, otherwise
//! it stays a plain byte buffer.

use core::{fmt, ops::Range};

use alloc::vec::Vec;
use tracing::trace;

use crate::{
    cursor::Cursor,
    display::AmlDisplayer,
    error::{AmlParseError, AmlParseErrorKind},
    node::ResourceDataNode,
};

mod consts {
    pub const LARGE_ITEM: u8 = 0x80;
    pub const END_TAG_FULL: u8 = 0x79;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Irq,
    Dma,
    StartDependentFunctions,
    EndDependentFunctions,
    Io,
    FixedIo,
    FixedDma,
    VendorShort,
    EndTag,
    Memory24,
    GenericRegister,
    VendorLarge,
    Memory32,
    Memory32Fixed,
    DWordAddressSpace,
    WordAddressSpace,
    ExtendedInterrupt,
    QWordAddressSpace,
    ExtendedAddressSpace,
    GpioConnection,
    PinFunction,
    SerialBusConnection,
    PinConfiguration,
    PinGroup,
    PinGroupFunction,
    PinGroupConfiguration,
    ClockInput,
}

impl ResourceType {
    fn from_small(item: u8) -> Option<Self> {
        Some(match item {
            0x04 => Self::Irq,
            0x05 => Self::Dma,
            0x06 => Self::StartDependentFunctions,
            0x07 => Self::EndDependentFunctions,
            0x08 => Self::Io,
            0x09 => Self::FixedIo,
            0x0A => Self::FixedDma,
            0x0E => Self::VendorShort,
            0x0F => Self::EndTag,
            _ => return None,
        })
    }

    fn from_large(item: u8) -> Option<Self> {
        Some(match item {
            0x01 => Self::Memory24,
            0x02 => Self::GenericRegister,
            0x04 => Self::VendorLarge,
            0x05 => Self::Memory32,
            0x06 => Self::Memory32Fixed,
            0x07 => Self::DWordAddressSpace,
            0x08 => Self::WordAddressSpace,
            0x09 => Self::ExtendedInterrupt,
            0x0A => Self::QWordAddressSpace,
            0x0B => Self::ExtendedAddressSpace,
            0x0C => Self::GpioConnection,
            0x0D => Self::PinFunction,
            0x0E => Self::SerialBusConnection,
            0x0F => Self::PinConfiguration,
            0x10 => Self::PinGroup,
            0x11 => Self::PinGroupFunction,
            0x12 => Self::PinGroupConfiguration,
            0x13 => Self::ClockInput,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaSpeedType {
    Compatibility,
    TypeA,
    TypeB,
    TypeF,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaTransferType {
    Transfer8,
    Transfer16,
    Transfer8_16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum DmaTransferWidth {
    Width8Bit,
    Width16Bit,
    Width32Bit,
    Width64Bit,
    Width128Bit,
    Width256Bit,
}

/// Decoded view of one resource descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceDescriptor {
    Irq {
        wake_capable: bool,
        is_shared: bool,
        active_low: bool,
        edge_triggered: bool,
        irqs_mask: u16,
    },
    Dma {
        speed_ty: DmaSpeedType,
        is_bus_master: bool,
        transfer_type: DmaTransferType,
        channels_mask: u8,
    },
    StartDependentFunctions {
        compatibility_priority: u8,
        performance_priority: u8,
    },
    EndDependentFunctions,
    Io {
        is_16_bit_decode: bool,
        min_addr: u16,
        max_addr: u16,
        alignment: u8,
        len: u8,
    },
    FixedIo {
        base: u16,
        len: u8,
    },
    FixedDma {
        dma_req: u16,
        channel: u16,
        transfer_width: DmaTransferWidth,
    },
    VendorShort {
        data: Vec<u8>,
    },
    VendorLarge {
        data: Vec<u8>,
    },
    Memory24 {
        is_read_write: bool,
        min_addr: u32,
        max_addr: u32,
        alignment: u16,
        len: u16,
    },
    Memory32Fixed {
        is_read_write: bool,
        base_addr: u32,
        len: u32,
    },
    Memory32 {
        is_read_write: bool,
        min_addr: u32,
        max_addr: u32,
        alignment: u32,
        len: u32,
    },
    Interrupt {
        is_consumer: bool,
        edge_triggered: bool,
        active_low: bool,
        is_shared: bool,
        wake_capable: bool,
        interrupts: Vec<u32>,
        resource_source_index: Option<u8>,
        resource_source: Option<Vec<u8>>,
    },
    Register {
        address_space: u8,
        bit_width: u8,
        offset: u8,
        address: u64,
        access_size: u8,
    },
    /// Descriptors kept as their body only: address spaces, GPIO, serial bus, pins, clocks
    Other {
        ty: ResourceType,
        data: Vec<u8>,
    },
    End {
        checksum: u8,
    },
}

impl ResourceDescriptor {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            ResourceDescriptor::Irq { .. } => ResourceType::Irq,
            ResourceDescriptor::Dma { .. } => ResourceType::Dma,
            ResourceDescriptor::StartDependentFunctions { .. } => {
                ResourceType::StartDependentFunctions
            }
            ResourceDescriptor::EndDependentFunctions => ResourceType::EndDependentFunctions,
            ResourceDescriptor::Io { .. } => ResourceType::Io,
            ResourceDescriptor::FixedIo { .. } => ResourceType::FixedIo,
            ResourceDescriptor::FixedDma { .. } => ResourceType::FixedDma,
            ResourceDescriptor::VendorShort { .. } => ResourceType::VendorShort,
            ResourceDescriptor::VendorLarge { .. } => ResourceType::VendorLarge,
            ResourceDescriptor::Memory24 { .. } => ResourceType::Memory24,
            ResourceDescriptor::Memory32Fixed { .. } => ResourceType::Memory32Fixed,
            ResourceDescriptor::Memory32 { .. } => ResourceType::Memory32,
            ResourceDescriptor::Interrupt { .. } => ResourceType::ExtendedInterrupt,
            ResourceDescriptor::Register { .. } => ResourceType::GenericRegister,
            ResourceDescriptor::Other { ty, .. } => *ty,
            ResourceDescriptor::End { .. } => ResourceType::EndTag,
        }
    }

    /// Decode the body of one descriptor, `Invalid` if the length doesn't match
    /// the type or reserved bits are set.
    fn decode(ty: ResourceType, tag: u8, body: &[u8]) -> Result<Self, DecodeError> {
        let mut body_cursor = Cursor::new(body);
        let parser = &mut body_cursor;

        let result = match ty {
            ResourceType::Irq => {
                let irqs_mask = parser.read_u16()?;

                let mut wake_capable = false;
                let mut is_shared = false;
                let mut active_low = false;
                let mut edge_triggered = true;

                // the 3 bytes form contains the flags
                if body.len() == 3 {
                    let flags = parser.read_u8()?;
                    edge_triggered = flags & 1 != 0;
                    active_low = flags & (1 << 3) != 0;
                    is_shared = flags & (1 << 4) != 0;
                    wake_capable = flags & (1 << 5) != 0;

                    if flags & (0b11 << 6) != 0 {
                        return Err(DecodeError::Invalid);
                    }
                }

                ResourceDescriptor::Irq {
                    wake_capable,
                    is_shared,
                    active_low,
                    edge_triggered,
                    irqs_mask,
                }
            }
            ResourceType::Dma => {
                let channels_mask = parser.read_u8()?;
                let flags = parser.read_u8()?;

                if flags & 0x80 != 0 {
                    return Err(DecodeError::Invalid);
                }

                let transfer_type = match flags & 0b11 {
                    0b00 => DmaTransferType::Transfer8,
                    0b01 => DmaTransferType::Transfer8_16,
                    0b10 => DmaTransferType::Transfer16,
                    _ => return Err(DecodeError::Invalid),
                };
                let is_bus_master = (flags >> 2) & 1 == 1;
                let speed_ty = match (flags >> 5) & 0b11 {
                    0b00 => DmaSpeedType::Compatibility,
                    0b01 => DmaSpeedType::TypeA,
                    0b10 => DmaSpeedType::TypeB,
                    _ => DmaSpeedType::TypeF,
                };

                ResourceDescriptor::Dma {
                    speed_ty,
                    is_bus_master,
                    transfer_type,
                    channels_mask,
                }
            }
            ResourceType::StartDependentFunctions => {
                let mut compatibility_priority = 1;
                let mut performance_priority = 1;

                if body.len() == 1 {
                    let flags = parser.read_u8()?;
                    compatibility_priority = flags & 0b11;
                    performance_priority = (flags >> 2) & 0b11;

                    if flags & (0b1111 << 4) != 0 {
                        return Err(DecodeError::Invalid);
                    }
                }

                ResourceDescriptor::StartDependentFunctions {
                    compatibility_priority,
                    performance_priority,
                }
            }
            ResourceType::EndDependentFunctions => ResourceDescriptor::EndDependentFunctions,
            ResourceType::Io => {
                let flags = parser.read_u8()?;
                let min_addr = parser.read_u16()?;
                let max_addr = parser.read_u16()?;
                let alignment = parser.read_u8()?;
                let len = parser.read_u8()?;

                ResourceDescriptor::Io {
                    is_16_bit_decode: flags & 1 == 1,
                    min_addr,
                    max_addr,
                    alignment,
                    len,
                }
            }
            ResourceType::FixedIo => {
                let base = parser.read_u16()? & 0x3FF;
                let len = parser.read_u8()?;

                ResourceDescriptor::FixedIo { base, len }
            }
            ResourceType::FixedDma => {
                let dma_req = parser.read_u16()?;
                let channel = parser.read_u16()?;

                let transfer_width = match parser.read_u8()? {
                    0 => DmaTransferWidth::Width8Bit,
                    1 => DmaTransferWidth::Width16Bit,
                    2 => DmaTransferWidth::Width32Bit,
                    3 => DmaTransferWidth::Width64Bit,
                    4 => DmaTransferWidth::Width128Bit,
                    5 => DmaTransferWidth::Width256Bit,
                    _ => return Err(DecodeError::Invalid),
                };

                ResourceDescriptor::FixedDma {
                    dma_req,
                    channel,
                    transfer_width,
                }
            }
            ResourceType::VendorShort => ResourceDescriptor::VendorShort {
                data: copy_bytes(parser.read(body.len())?)?,
            },
            ResourceType::EndTag => ResourceDescriptor::End {
                checksum: parser.read_u8()?,
            },
            ResourceType::Memory24 => {
                let flags = parser.read_u8()?;

                let min_addr = parser.read_u16()?;
                let max_addr = parser.read_u16()?;
                let alignment = parser.read_u16()?;
                let len = parser.read_u16()?;

                ResourceDescriptor::Memory24 {
                    is_read_write: flags & 1 == 1,
                    min_addr: (min_addr as u32) << 8,
                    max_addr: (max_addr as u32) << 8,
                    alignment,
                    len,
                }
            }
            ResourceType::GenericRegister => {
                let address_space = parser.read_u8()?;
                let bit_width = parser.read_u8()?;
                let offset = parser.read_u8()?;
                let access_size = parser.read_u8()?;
                let address = parser.read_u64()?;

                // undefined, byte, word, dword, qword
                if access_size > 4 {
                    return Err(DecodeError::Invalid);
                }

                ResourceDescriptor::Register {
                    address_space,
                    bit_width,
                    offset,
                    address,
                    access_size,
                }
            }
            ResourceType::VendorLarge => ResourceDescriptor::VendorLarge {
                data: copy_bytes(parser.read(body.len())?)?,
            },
            ResourceType::Memory32 => {
                let flags = parser.read_u8()?;

                let min_addr = parser.read_u32()?;
                let max_addr = parser.read_u32()?;
                let alignment = parser.read_u32()?;
                let len = parser.read_u32()?;

                ResourceDescriptor::Memory32 {
                    is_read_write: flags & 1 == 1,
                    min_addr,
                    max_addr,
                    alignment,
                    len,
                }
            }
            ResourceType::Memory32Fixed => {
                let flags = parser.read_u8()?;

                let base_addr = parser.read_u32()?;
                let len = parser.read_u32()?;

                ResourceDescriptor::Memory32Fixed {
                    is_read_write: flags & 1 == 1,
                    base_addr,
                    len,
                }
            }
            ResourceType::ExtendedInterrupt => {
                let flags = parser.read_u8()?;
                let table_len = parser.read_u8()?;

                let mut interrupts = Vec::new();
                interrupts
                    .try_reserve_exact(table_len as usize)
                    .map_err(|_| DecodeError::AllocationFailure)?;
                for _ in 0..table_len {
                    interrupts.push(parser.read_u32()?);
                }

                let resource_source_index = if parser.remaining() > 0 {
                    Some(parser.read_u8()?)
                } else {
                    None
                };
                let resource_source = if parser.remaining() > 0 {
                    Some(copy_bytes(parser.read(parser.remaining())?)?)
                } else {
                    None
                };

                ResourceDescriptor::Interrupt {
                    is_consumer: flags & 1 != 0,
                    edge_triggered: flags & (1 << 1) != 0,
                    active_low: flags & (1 << 2) != 0,
                    is_shared: flags & (1 << 3) != 0,
                    wake_capable: flags & (1 << 4) != 0,
                    interrupts,
                    resource_source_index,
                    resource_source,
                }
            }
            ty => ResourceDescriptor::Other {
                ty,
                data: copy_bytes(parser.read(body.len())?)?,
            },
        };

        if parser.remaining() != 0 {
            trace!("resource descriptor {tag:#x} has {} extra bytes", parser.remaining());
            return Err(DecodeError::Invalid);
        }

        Ok(result)
    }
}

/// Why a descriptor couldn't be decoded
#[derive(Debug)]
enum DecodeError {
    /// The buffer isn't a resource template
    Invalid,
    AllocationFailure,
}

impl From<AmlParseError> for DecodeError {
    // reads inside a descriptor body only fail when the body is too short
    fn from(_: AmlParseError) -> Self {
        DecodeError::Invalid
    }
}

fn copy_bytes(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut data = Vec::new();
    data.try_reserve_exact(bytes.len())
        .map_err(|_| DecodeError::AllocationFailure)?;
    data.extend_from_slice(bytes);
    Ok(data)
}

/// Expected body length of fixed size descriptors
fn body_len_valid(ty: ResourceType, len: usize) -> bool {
    match ty {
        ResourceType::Irq => matches!(len, 2 | 3),
        ResourceType::Dma => len == 2,
        ResourceType::StartDependentFunctions => matches!(len, 0 | 1),
        ResourceType::EndDependentFunctions => len == 0,
        ResourceType::Io => len == 7,
        ResourceType::FixedIo => len == 3,
        ResourceType::FixedDma => len == 5,
        ResourceType::VendorShort => (1..=7).contains(&len),
        ResourceType::EndTag => len == 1,
        ResourceType::Memory24 => len == 9,
        ResourceType::GenericRegister => len == 12,
        ResourceType::Memory32 => len == 17,
        ResourceType::Memory32Fixed => len == 9,
        ResourceType::ExtendedInterrupt => len >= 6,
        _ => true,
    }
}

/// Read a descriptor header, returns the type and the body length
fn read_header(cursor: &mut Cursor) -> Option<(u8, ResourceType, usize)> {
    let tag = cursor.read_u8().ok()?;

    if tag & consts::LARGE_ITEM == 0 {
        let ty = ResourceType::from_small((tag >> 3) & 0x0F)?;
        return Some((tag, ty, (tag & 0b111) as usize));
    }

    let ty = ResourceType::from_large(tag & 0x7F)?;
    let len = cursor.read_u16().ok()?;
    Some((tag, ty, len as usize))
}

/// Split `bytes`, which starts at `base` in the AML stream, into resource
/// descriptors. Returns `None` if it isn't a valid resource template.
pub(crate) fn parse_template(
    bytes: &[u8],
    base: usize,
    check_checksum: bool,
) -> Result<Option<Vec<ResourceDataNode>>, AmlParseError> {
    // quick check before decoding anything
    if bytes.len() < 2 || bytes[bytes.len() - 2] != consts::END_TAG_FULL {
        return Ok(None);
    }

    if check_checksum {
        let sum: u8 = bytes.iter().fold(0, |a, b| a.wrapping_add(*b));
        // The checksum must match or the last element can be 0
        if sum != 0 && bytes.last() != Some(&0) {
            return Ok(None);
        }
    }

    let mut cursor = Cursor::new(bytes);
    let mut nodes = Vec::new();

    while cursor.remaining() > 0 {
        let start = cursor.position();
        let Some((tag, ty, len)) = read_header(&mut cursor) else {
            return Ok(None);
        };
        if !body_len_valid(ty, len) {
            return Ok(None);
        }
        let Ok(body) = cursor.read(len) else {
            return Ok(None);
        };
        let allocation_failure =
            || AmlParseError::new(AmlParseErrorKind::AllocationFailure, base + start);
        let descriptor = match ResourceDescriptor::decode(ty, tag, body) {
            Ok(descriptor) => descriptor,
            Err(DecodeError::Invalid) => return Ok(None),
            Err(DecodeError::AllocationFailure) => return Err(allocation_failure()),
        };

        let span: Range<usize> = start..cursor.position();
        let descriptor_bytes =
            copy_bytes(&bytes[span.clone()]).map_err(|_| allocation_failure())?;
        nodes.try_reserve(1).map_err(|_| allocation_failure())?;
        nodes.push(ResourceDataNode {
            descriptor,
            bytes: descriptor_bytes,
            span: base + span.start..base + span.end,
        });

        if ty == ResourceType::EndTag {
            // the end tag must be the last thing in the buffer
            return Ok((cursor.remaining() == 0).then_some(nodes));
        }
    }

    Ok(None)
}

#[allow(clippy::too_many_arguments)]
fn display_interrupt_args<'a, 'b, 'r>(
    d: &'r mut AmlDisplayer<'a, 'b>,
    is_consumer: Option<bool>,
    wake_capable: bool,
    is_shared: bool,
    active_low: bool,
    edge_triggered: bool,
    resource_source_index: Option<u8>,
    resource_source: Option<&Vec<u8>>,
) -> &'r mut AmlDisplayer<'a, 'b> {
    if let Some(is_consumer) = is_consumer {
        d.paren_arg(|f| {
            f.write_str(if is_consumer {
                "ResourceConsumer"
            } else {
                "ResourceProducer"
            })
        });
    }

    d.paren_arg(|f| f.write_str(if edge_triggered { "Edge" } else { "Level" }))
        .paren_arg(|f| {
            f.write_str(if active_low {
                "ActiveLow"
            } else {
                "ActiveHigh"
            })
        })
        .paren_arg(|f| {
            f.write_str(if is_shared { "Shared" } else { "Exclusive" })?;
            if wake_capable {
                f.write_str("WakeCapable")
            } else {
                Ok(())
            }
        });
    if let Some(resource_source_index) = resource_source_index {
        d.paren_arg(|f| write!(f, "{}", resource_source_index));
    }
    if let Some(resource_source) = resource_source {
        // null terminated path
        let source = resource_source.split(|b| *b == 0).next().unwrap_or_default();
        d.paren_arg(|f| write!(f, "\"{}\"", source.escape_ascii()));
    }

    d
}

fn display_memory_args<'a, 'b>(
    f: &'a mut fmt::Formatter<'b>,
    name: &str,
    is_read_write: bool,
    nums: &[u32],
) -> AmlDisplayer<'a, 'b> {
    let mut d = AmlDisplayer::start(f, name);

    d.paren_arg(|f| {
        f.write_str(if is_read_write {
            "ReadWrite"
        } else {
            "ReadOnly"
        })
    });

    for num in nums {
        d.paren_arg(|f| write!(f, "0x{:08X}", num));
    }

    d
}

fn display_bytes(d: &mut AmlDisplayer<'_, '_>, data: &[u8]) {
    d.set_list(true);
    for e in data {
        d.body_field(|f| write!(f, "0x{:02X}", e));
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceDescriptor::Irq {
                wake_capable,
                is_shared,
                active_low,
                edge_triggered,
                irqs_mask,
            } => {
                let mut d = AmlDisplayer::start(f, "IRQ");
                display_interrupt_args(
                    &mut d,
                    None,
                    *wake_capable,
                    *is_shared,
                    *active_low,
                    *edge_triggered,
                    None,
                    None,
                )
                .finish_paren_arg()
                .set_list(true);

                for i in 0..16 {
                    if irqs_mask & (1 << i) != 0 {
                        d.body_field(|f| write!(f, "{}", i));
                    }
                }

                d.at_least_empty_body().finish()
            }
            ResourceDescriptor::Dma {
                speed_ty,
                is_bus_master,
                transfer_type,
                channels_mask,
            } => {
                let mut d = AmlDisplayer::start(f, "DMA");
                d.paren_arg(|f| write!(f, "{speed_ty:?}"))
                    .paren_arg(|f| {
                        f.write_str(if *is_bus_master {
                            "BusMaster"
                        } else {
                            "NotBusMaster"
                        })
                    })
                    .paren_arg(|f| write!(f, "{transfer_type:?}"))
                    .set_list(true);

                for i in 0..8 {
                    if channels_mask & (1 << i) != 0 {
                        d.body_field(|f| write!(f, "{}", i));
                    }
                }

                d.at_least_empty_body().finish()
            }
            ResourceDescriptor::StartDependentFunctions {
                compatibility_priority,
                performance_priority,
            } => AmlDisplayer::start(f, "StartDependentFn")
                .paren_arg(|f| write!(f, "{}", compatibility_priority))
                .paren_arg(|f| write!(f, "{}", performance_priority))
                .finish(),
            ResourceDescriptor::EndDependentFunctions => {
                AmlDisplayer::start(f, "EndDependentFn")
                    .at_least_empty_paren_arg()
                    .finish()
            }
            ResourceDescriptor::Io {
                is_16_bit_decode,
                min_addr,
                max_addr,
                alignment,
                len,
            } => AmlDisplayer::start(f, "IO")
                .paren_arg(|f| {
                    f.write_str(if *is_16_bit_decode {
                        "Decode16"
                    } else {
                        "Decode10"
                    })
                })
                .paren_arg(|f| write!(f, "0x{:04X}", min_addr))
                .paren_arg(|f| write!(f, "0x{:04X}", max_addr))
                .paren_arg(|f| write!(f, "0x{:02X}", alignment))
                .paren_arg(|f| write!(f, "0x{:02X}", len))
                .finish(),
            ResourceDescriptor::FixedIo { base, len } => AmlDisplayer::start(f, "FixedIO")
                .paren_arg(|f| write!(f, "0x{:04X}", base))
                .paren_arg(|f| write!(f, "0x{:02X}", len))
                .finish(),
            ResourceDescriptor::FixedDma {
                dma_req,
                channel,
                transfer_width,
            } => AmlDisplayer::start(f, "FixedDMA")
                .paren_arg(|f| write!(f, "0x{:04X}", dma_req))
                .paren_arg(|f| write!(f, "0x{:04X}", channel))
                .paren_arg(|f| write!(f, "{transfer_width:?}"))
                .finish(),
            ResourceDescriptor::VendorShort { data } => {
                let mut d = AmlDisplayer::start(f, "VendorShort");
                d.at_least_empty_paren_arg();
                display_bytes(&mut d, data);
                d.finish()
            }
            ResourceDescriptor::VendorLarge { data } => {
                let mut d = AmlDisplayer::start(f, "VendorLong");
                d.at_least_empty_paren_arg();
                display_bytes(&mut d, data);
                d.finish()
            }
            ResourceDescriptor::Memory24 {
                is_read_write,
                min_addr,
                max_addr,
                alignment,
                len,
            } => display_memory_args(
                f,
                "Memory24",
                *is_read_write,
                &[*min_addr, *max_addr, *alignment as u32, *len as u32],
            )
            .finish(),
            ResourceDescriptor::Memory32Fixed {
                is_read_write,
                base_addr,
                len,
            } => display_memory_args(f, "Memory32Fixed", *is_read_write, &[*base_addr, *len])
                .finish(),
            ResourceDescriptor::Memory32 {
                is_read_write,
                min_addr,
                max_addr,
                alignment,
                len,
            } => display_memory_args(
                f,
                "Memory32",
                *is_read_write,
                &[*min_addr, *max_addr, *alignment, *len],
            )
            .finish(),
            ResourceDescriptor::Interrupt {
                is_consumer,
                edge_triggered,
                active_low,
                is_shared,
                wake_capable,
                interrupts,
                resource_source_index,
                resource_source,
            } => {
                let mut d = AmlDisplayer::start(f, "Interrupt");
                display_interrupt_args(
                    &mut d,
                    Some(*is_consumer),
                    *wake_capable,
                    *is_shared,
                    *active_low,
                    *edge_triggered,
                    *resource_source_index,
                    resource_source.as_ref(),
                )
                .finish_paren_arg()
                .set_list(true);

                for i in interrupts {
                    d.body_field(|f| write!(f, "0x{:08X}", i));
                }

                d.at_least_empty_body().finish()
            }
            ResourceDescriptor::Register {
                address_space,
                bit_width,
                offset,
                address,
                access_size,
            } => AmlDisplayer::start(f, "Register")
                .paren_arg(|f| write!(f, "0x{:02X}", address_space))
                .paren_arg(|f| write!(f, "0x{:02X}", bit_width))
                .paren_arg(|f| write!(f, "0x{:02X}", offset))
                .paren_arg(|f| write!(f, "0x{:016X}", address))
                .paren_arg(|f| write!(f, "{}", access_size))
                .finish(),
            ResourceDescriptor::Other { ty, data } => {
                let mut d = AmlDisplayer::start(f, "RawDescriptor");
                d.paren_arg(|f| write!(f, "{ty:?}"));
                display_bytes(&mut d, data);
                d.finish()
            }
            ResourceDescriptor::End { .. } => AmlDisplayer::start(f, "EndTag")
                .at_least_empty_paren_arg()
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;
    use crate::testing;

    /// Fix the checksum byte of a template ending with the end tag
    fn with_checksum(mut bytes: Vec<u8>) -> Vec<u8> {
        let sum: u8 = bytes.iter().fold(0, |a, b| a.wrapping_add(*b));
        let last = bytes.len() - 1;
        bytes[last] = bytes[last].wrapping_sub(sum);
        bytes
    }

    testing::test! {
        fn test_parse_template() {
            let bytes = alloc::vec![
                // IO (Decode16, 0x60, 0x60, 0x01, 0x01)
                0x47, 0x01, 0x60, 0x00, 0x60, 0x00, 0x01, 0x01,
                // IRQNoFlags () {1}
                0x22, 0x02, 0x00,
                // Memory32Fixed (ReadWrite, 0xFED00000, 0x400)
                0x86, 0x09, 0x00, 0x01, 0x00, 0x00, 0xD0, 0xFE, 0x00, 0x04, 0x00, 0x00,
                0x79, 0x00,
            ];

            let nodes = parse_template(&bytes, 0x100, true).unwrap().unwrap();
            let types: Vec<_> = nodes.iter().map(|n| n.descriptor_type()).collect();
            assert_eq!(
                types,
                [
                    ResourceType::Io,
                    ResourceType::Irq,
                    ResourceType::Memory32Fixed,
                    ResourceType::EndTag
                ]
            );
            assert_eq!(nodes[0].span(), 0x100..0x108);
            assert_eq!(nodes[3].span(), 0x100 + bytes.len() - 2..0x100 + bytes.len());
            assert_eq!(
                nodes[2].descriptor(),
                &ResourceDescriptor::Memory32Fixed {
                    is_read_write: true,
                    base_addr: 0xFED0_0000,
                    len: 0x400,
                }
            );
            assert_eq!(nodes[1].descriptor().to_string(), "IRQ (Edge, ActiveHigh, Exclusive) { 1 }");
        }

        fn test_checksum() {
            let bytes = with_checksum(alloc::vec![0x4B, 0x20, 0x00, 0x02, 0x79, 0x00]);
            assert!(parse_template(&bytes, 0, true).unwrap().is_some());

            let mut bad = bytes.clone();
            bad[3] = 0x03;
            assert!(parse_template(&bad, 0, true).unwrap().is_none());
            assert!(parse_template(&bad, 0, false).unwrap().is_some());
        }

        fn test_not_a_template() {
            // looks like an end tag at the end, but the IO descriptor is cut short
            let bytes = [0x47, 0x01, 0x60, 0x79, 0x00];
            assert!(parse_template(&bytes, 0, true).unwrap().is_none());

            // plain string
            assert!(parse_template(b"hello\0", 0, true).unwrap().is_none());

            // data after the end tag
            let bytes = [0x79, 0x00, 0x79, 0x00];
            assert!(parse_template(&bytes, 0, true).unwrap().is_none());

            // reserved IRQ flags
            let bytes = [0x23, 0x02, 0x00, 0xC0, 0x79, 0x00];
            assert!(parse_template(&bytes, 0, true).unwrap().is_none());
        }

        fn test_decode_errors() {
            // a short body is not a descriptor, not a failure
            assert!(matches!(
                ResourceDescriptor::decode(ResourceType::Irq, 0x22, &[0x02]),
                Err(DecodeError::Invalid)
            ));
            assert!(matches!(
                ResourceDescriptor::decode(ResourceType::Irq, 0x22, &[0x02, 0x00, 0x01, 0x00]),
                Err(DecodeError::Invalid)
            ));

            let Ok(ResourceDescriptor::VendorShort { data }) =
                ResourceDescriptor::decode(ResourceType::VendorShort, 0x73, &[1, 2, 3])
            else {
                panic!("expected vendor data");
            };
            assert_eq!(data, [1, 2, 3]);
        }

        fn test_extended_interrupt() {
            let bytes = [
                0x89, 0x06, 0x00, 0x0B, 0x01, 0x09, 0x00, 0x00, 0x00,
                0x79, 0x00,
            ];
            let nodes = parse_template(&bytes, 0, true).unwrap().unwrap();
            assert_eq!(
                nodes[0].descriptor(),
                &ResourceDescriptor::Interrupt {
                    is_consumer: true,
                    edge_triggered: true,
                    active_low: false,
                    is_shared: true,
                    wake_capable: false,
                    interrupts: alloc::vec![9],
                    resource_source_index: None,
                    resource_source: None,
                }
            );
        }
    }
}
