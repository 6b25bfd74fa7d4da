//! Binary framing between the coordinator and worker processes
//!
//! Every message is a fixed 40-byte [`FrameHeader`] followed by a payload
//! whose length the header states. Particle payloads are raw
//! [`ParticleRecord`] bytes, so a snapshot goes over the pipe exactly as it
//! sits in memory. Both ends run on the same host, native endianness is used.

use std::io::{self, Read, Write};
use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use particle_physics::{GravityModel, ParticleRecord};

use crate::error::SimError;

pub const TAG_CONFIGURE: u32 = 1;
pub const TAG_POSITION_PHASE: u32 = 2;
pub const TAG_VELOCITY_PHASE: u32 = 3;
pub const TAG_PARTITION: u32 = 4;
pub const TAG_FAILURE: u32 = 5;
pub const TAG_SHUTDOWN: u32 = 6;

/// Failure code: non-finite acceleration, particle index in `start`
pub const FAILURE_DEGENERATE: u32 = 1;
/// Failure code: anything else, UTF-8 message as payload
pub const FAILURE_OTHER: u32 = 2;

const RECORD_BYTES: usize = std::mem::size_of::<ParticleRecord>();

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FrameHeader {
    pub tag: u32,
    pub worker: u32,
    pub start: u32,
    pub end: u32,
    /// Records (or message bytes) following the header
    pub count: u32,
    /// Collision gate flag for `Configure`, failure code for `Failure`
    pub code: u32,
    pub dt: f64,
    pub gravitational_constant: f64,
}

const HEADER_BYTES: usize = std::mem::size_of::<FrameHeader>();
const _: () = assert!(HEADER_BYTES == 40);

/// Phase a coordinator request asks for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Position,
    Velocity,
}

#[derive(Clone, Debug, PartialEq)]
pub enum WorkerFailure {
    Degenerate { index: usize },
    Other(String),
}

/// One decoded message
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Configure {
        worker: usize,
        model: GravityModel,
    },
    /// Full snapshot plus the range the worker owns
    Phase {
        phase: Phase,
        range: Range<usize>,
        dt: f64,
        records: Vec<ParticleRecord>,
    },
    /// A worker's updated records for its range
    Partition {
        worker: usize,
        range: Range<usize>,
        records: Vec<ParticleRecord>,
    },
    Failure {
        worker: usize,
        failure: WorkerFailure,
    },
    Shutdown,
}

fn wire_u32(value: usize, what: &str) -> Result<u32, SimError> {
    u32::try_from(value).map_err(|_| SimError::Protocol(format!("{what} {value} exceeds u32")))
}

fn write_frame<W: Write>(writer: &mut W, header: &FrameHeader, payload: &[u8]) -> io::Result<()> {
    writer.write_all(bytemuck::bytes_of(header))?;
    writer.write_all(payload)?;
    writer.flush()
}

pub fn send_configure<W: Write>(
    writer: &mut W,
    worker: usize,
    model: &GravityModel,
) -> Result<(), SimError> {
    let header = FrameHeader {
        tag: TAG_CONFIGURE,
        worker: wire_u32(worker, "worker")?,
        code: model.collision_gate as u32,
        gravitational_constant: model.gravitational_constant,
        ..FrameHeader::default()
    };
    Ok(write_frame(writer, &header, &[])?)
}

pub fn send_phase<W: Write>(
    writer: &mut W,
    phase: Phase,
    range: Range<usize>,
    dt: f64,
    records: &[ParticleRecord],
) -> Result<(), SimError> {
    let header = FrameHeader {
        tag: match phase {
            Phase::Position => TAG_POSITION_PHASE,
            Phase::Velocity => TAG_VELOCITY_PHASE,
        },
        start: wire_u32(range.start, "range start")?,
        end: wire_u32(range.end, "range end")?,
        count: wire_u32(records.len(), "record count")?,
        dt,
        ..FrameHeader::default()
    };
    Ok(write_frame(writer, &header, bytemuck::cast_slice(records))?)
}

pub fn send_partition<W: Write>(
    writer: &mut W,
    worker: usize,
    range: Range<usize>,
    records: &[ParticleRecord],
) -> Result<(), SimError> {
    let header = FrameHeader {
        tag: TAG_PARTITION,
        worker: wire_u32(worker, "worker")?,
        start: wire_u32(range.start, "range start")?,
        end: wire_u32(range.end, "range end")?,
        count: wire_u32(records.len(), "record count")?,
        ..FrameHeader::default()
    };
    Ok(write_frame(writer, &header, bytemuck::cast_slice(records))?)
}

pub fn send_failure<W: Write>(
    writer: &mut W,
    worker: usize,
    failure: &WorkerFailure,
) -> Result<(), SimError> {
    let mut header = FrameHeader {
        tag: TAG_FAILURE,
        worker: wire_u32(worker, "worker")?,
        ..FrameHeader::default()
    };
    let payload: &[u8] = match failure {
        WorkerFailure::Degenerate { index } => {
            header.code = FAILURE_DEGENERATE;
            header.start = wire_u32(*index, "particle index")?;
            &[]
        }
        WorkerFailure::Other(message) => {
            header.code = FAILURE_OTHER;
            header.count = wire_u32(message.len(), "message length")?;
            message.as_bytes()
        }
    };
    Ok(write_frame(writer, &header, payload)?)
}

pub fn send_shutdown<W: Write>(writer: &mut W) -> Result<(), SimError> {
    let header = FrameHeader {
        tag: TAG_SHUTDOWN,
        ..FrameHeader::default()
    };
    Ok(write_frame(writer, &header, &[])?)
}

fn read_records<R: Read>(reader: &mut R, count: usize) -> Result<Vec<ParticleRecord>, SimError> {
    let mut bytes = vec![0u8; count * RECORD_BYTES];
    reader.read_exact(&mut bytes)?;
    Ok(bytemuck::pod_collect_to_vec(&bytes))
}

/// Block until one complete frame has been read.
///
/// A stream closed before the header yields `SimError::Io` with
/// `UnexpectedEof`.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Frame, SimError> {
    let mut raw = [0u8; HEADER_BYTES];
    reader.read_exact(&mut raw)?;
    let header: FrameHeader = bytemuck::pod_read_unaligned(&raw);

    let range = header.start as usize..header.end as usize;
    let count = header.count as usize;

    let frame = match header.tag {
        TAG_CONFIGURE => Frame::Configure {
            worker: header.worker as usize,
            model: GravityModel::new(header.gravitational_constant)
                .with_collision_gate(header.code != 0),
        },
        TAG_POSITION_PHASE | TAG_VELOCITY_PHASE => {
            if range.start > range.end || range.end > count {
                return Err(SimError::Protocol(format!(
                    "range {range:?} outside snapshot of {count} particles"
                )));
            }
            Frame::Phase {
                phase: if header.tag == TAG_POSITION_PHASE {
                    Phase::Position
                } else {
                    Phase::Velocity
                },
                range,
                dt: header.dt,
                records: read_records(reader, count)?,
            }
        }
        TAG_PARTITION => {
            if range.end < range.start || range.len() != count {
                return Err(SimError::Protocol(format!(
                    "partition {range:?} carries {count} records"
                )));
            }
            Frame::Partition {
                worker: header.worker as usize,
                range,
                records: read_records(reader, count)?,
            }
        }
        TAG_FAILURE => {
            let failure = match header.code {
                FAILURE_DEGENERATE => WorkerFailure::Degenerate {
                    index: header.start as usize,
                },
                _ => {
                    let mut message = vec![0u8; count];
                    reader.read_exact(&mut message)?;
                    WorkerFailure::Other(String::from_utf8_lossy(&message).into_owned())
                }
            };
            Frame::Failure {
                worker: header.worker as usize,
                failure,
            }
        }
        TAG_SHUTDOWN => Frame::Shutdown,
        tag => return Err(SimError::Protocol(format!("unknown frame tag {tag}"))),
    };
    Ok(frame)
}

/// True when `error` means the other end closed the pipe
pub fn is_disconnect(error: &SimError) -> bool {
    matches!(
        error,
        SimError::Io(e) if matches!(
            e.kind(),
            io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe
        )
    )
}
