//! Streamer: feeds rows/columns between L2 and L1 with per-lane staggering
//! matching the systolic array's wavefront timing.

use crate::common::{Address, Completion, Cycle, InstructionId, KpuResult};
use crate::isa::StreamGeometry;
use crate::memory::{L1Buffer, L2Bank};

const CACHE_LINE_BYTES: usize = 64;

/// Which tile a stream carries and which axis it lanes across.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    /// A matrix, horizontal: one lane per row.
    Row,
    /// B matrix, vertical: one lane per column.
    Col,
    /// C matrix evacuation, L1 back to L2: one lane per row.
    Out,
}

impl StreamKind {
    fn direction(self) -> Direction {
        match self {
            StreamKind::Row | StreamKind::Col => Direction::L2ToL1,
            StreamKind::Out => Direction::L1ToL2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    L2ToL1,
    L1ToL2,
}

/// One stream request accepted by a Streamer.
#[derive(Clone, Copy, Debug)]
pub struct StreamJob {
    /// Instruction id this stream was issued for, if any.
    pub instruction_id: Option<InstructionId>,
    /// Which axis the stream lanes over, and which direction it moves data.
    pub kind: StreamKind,
    /// Source L2 bank (row/col streams) or source L1 buffer (out streams).
    pub src_id: usize,
    /// Destination L1 buffer (row/col streams) or destination L2 bank (out streams).
    pub dst_id: usize,
    /// Stream geometry (addresses, tile shape, element size, fabric width).
    pub geometry: StreamGeometry,
}

/// A single-cache-line read-through/write-combine buffer, modeling the
/// streamer's datapath: contiguous element fetches hit the line, a
/// non-contiguous access refills it.
#[derive(Clone, Debug, Default)]
struct CacheLine {
    tag: Option<u64>,
    data: [u8; CACHE_LINE_BYTES],
}

impl CacheLine {
    fn line_base(offset: Address) -> u64 {
        offset.val() - (offset.val() % CACHE_LINE_BYTES as u64)
    }

    fn read_element(&mut self, bank: &L2Bank, offset: Address, elem: usize) -> KpuResult<[u8; 8]> {
        let base = Self::line_base(offset);
        if self.tag != Some(base) {
            bank.read(Address::new(base), &mut self.data)?;
            self.tag = Some(base);
        }
        let start = (offset.val() - base) as usize;
        let mut out = [0u8; 8];
        out[..elem].copy_from_slice(&self.data[start..start + elem]);
        Ok(out)
    }
}

#[derive(Debug)]
struct ActiveStream {
    job: StreamJob,
    lanes: u32,
    inner_len: u32,
    lane_pos: Vec<u32>,
    elapsed: u64,
    total_ticks: u64,
    cache: CacheLine,
}

/// One Streamer instance.
#[derive(Debug)]
pub struct Streamer {
    id: usize,
    queue: Vec<StreamJob>,
    active: Option<ActiveStream>,
}

impl Streamer {
    /// Creates a new, idle Streamer.
    #[must_use]
    pub fn new(id: usize) -> Self {
        Self {
            id,
            queue: Vec::new(),
            active: None,
        }
    }

    /// The engine index.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Whether the streamer has an active stream or queued work.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.active.is_some() || !self.queue.is_empty()
    }

    /// Enqueues a stream job.
    pub fn enqueue(&mut self, job: StreamJob) {
        self.queue.push(job);
        if self.active.is_none() {
            self.activate_next();
        }
    }

    fn activate_next(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let job = self.queue.remove(0);
        let (lanes, inner_len) = match job.kind {
            StreamKind::Row | StreamKind::Out => (job.geometry.height, job.geometry.width),
            StreamKind::Col => (job.geometry.width, job.geometry.height),
        };
        let active_lanes = lanes.min(job.geometry.fabric_size.max(1));
        let total_ticks = u64::from(inner_len) + u64::from(active_lanes) - 1;
        self.active = Some(ActiveStream {
            job,
            lanes: active_lanes,
            inner_len,
            lane_pos: vec![0; active_lanes as usize],
            elapsed: 0,
            total_ticks: total_ticks.max(1),
            cache: CacheLine::default(),
        });
    }

    /// Advances the streamer by one cycle, emitting at most one element per
    /// lane for every lane whose stagger delay has elapsed.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `src_id`/`dst_id` is out of bounds or an
    /// access overflows either resource.
    pub fn update(&mut self, current_cycle: Cycle, l2: &mut [L2Bank], l1: &mut [L1Buffer]) -> KpuResult<Option<Completion>> {
        let Some(active) = &mut self.active else {
            return Ok(None);
        };

        for lane in 0..active.lanes {
            if active.lane_pos[lane as usize] >= active.inner_len {
                continue;
            }
            if active.elapsed < u64::from(lane) {
                continue;
            }
            let pos = active.lane_pos[lane as usize];
            transfer_element(active, lane, pos, l2, l1)?;
            active.lane_pos[lane as usize] += 1;
        }
        active.elapsed += 1;

        if active.elapsed < active.total_ticks {
            return Ok(None);
        }

        let job = active.job;
        let bytes = u64::from(active.lanes) * u64::from(active.inner_len) * u64::from(job.geometry.element_size);
        self.active = None;
        self.activate_next();
        Ok(Some(Completion::new(job.instruction_id, bytes, current_cycle)))
    }

    /// Drops all queued and active work without producing completions.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.active = None;
    }

    /// Rough cycle-count estimate for a stream of the given `kind` and
    /// `geometry`, for scheduling purposes only.
    ///
    /// This is an approximation (`inner_len + active_lanes`, not the exact
    /// `inner_len + active_lanes - 1` the streamer actually takes) and must
    /// not be used as a hard bound on `update`'s behavior.
    #[must_use]
    pub fn estimate_stream_cycles(kind: StreamKind, geometry: StreamGeometry) -> u64 {
        let (lanes, inner_len) = match kind {
            StreamKind::Row | StreamKind::Out => (geometry.height, geometry.width),
            StreamKind::Col => (geometry.width, geometry.height),
        };
        let active_lanes = lanes.min(geometry.fabric_size.max(1));
        u64::from(inner_len) + u64::from(active_lanes)
    }
}

fn transfer_element(active: &mut ActiveStream, lane: u32, pos: u32, l2: &mut [L2Bank], l1: &mut [L1Buffer]) -> KpuResult<()> {
    let job = active.job;
    let elem = job.geometry.element_size as usize;
    let (row, col) = match job.kind {
        StreamKind::Row | StreamKind::Out => (lane, pos),
        StreamKind::Col => (pos, lane),
    };
    let element_offset = (u64::from(row) * u64::from(job.geometry.width) + u64::from(col)) * u64::from(job.geometry.element_size);

    match job.kind.direction() {
        Direction::L2ToL1 => {
            let bank = get(l2, job.src_id)?;
            let bytes = active.cache.read_element(bank, job.geometry.l2_addr + element_offset, elem)?;
            let buffer = get_mut(l1, job.dst_id)?;
            buffer.write(job.geometry.l1_addr + element_offset, &bytes[..elem])?;
        }
        Direction::L1ToL2 => {
            let buffer = get(l1, job.src_id)?;
            let mut bytes = [0u8; 8];
            buffer.read(job.geometry.l1_addr + element_offset, &mut bytes[..elem])?;
            let bank = get_mut(l2, job.dst_id)?;
            bank.write(job.geometry.l2_addr + element_offset, &bytes[..elem])?;
        }
    }
    Ok(())
}

fn get<T>(slice: &[T], id: usize) -> KpuResult<&T> {
    slice.get(id).ok_or(crate::common::KpuError::OutOfRange {
        offset: id as u64,
        size: 1,
        capacity: slice.len() as u64,
    })
}

fn get_mut<T>(slice: &mut [T], id: usize) -> KpuResult<&mut T> {
    let len = slice.len() as u64;
    slice.get_mut(id).ok_or(crate::common::KpuError::OutOfRange {
        offset: id as u64,
        size: 1,
        capacity: len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> StreamGeometry {
        StreamGeometry {
            l2_addr: Address::new(0),
            l1_addr: Address::new(0),
            height: 2,
            width: 2,
            element_size: 4,
            fabric_size: 2,
        }
    }

    #[test]
    fn row_stream_staggers_lanes_by_index() {
        let mut streamer = Streamer::new(0);
        let mut l2 = vec![L2Bank::new(1024)];
        let mut l1 = vec![L1Buffer::new(1024)];
        l2[0].write(Address::new(0), &1.0f32.to_le_bytes()).unwrap();
        l2[0].write(Address::new(4), &2.0f32.to_le_bytes()).unwrap();
        l2[0].write(Address::new(8), &3.0f32.to_le_bytes()).unwrap();
        l2[0].write(Address::new(12), &4.0f32.to_le_bytes()).unwrap();

        streamer.enqueue(StreamJob {
            instruction_id: Some(9),
            kind: StreamKind::Row,
            src_id: 0,
            dst_id: 0,
            geometry: geometry(),
        });

        // total_ticks = width(2) + lanes(2) - 1 = 3
        let mut completion = None;
        for cycle in 0..10 {
            if let Some(c) = streamer.update(cycle, &mut l2, &mut l1).unwrap() {
                completion = Some((cycle, c));
                break;
            }
        }
        let (cycle, c) = completion.expect("stream should complete");
        assert_eq!(cycle, 2);
        assert_eq!(c.instruction_id, Some(9));

        let mut row0 = [0u8; 4];
        l1[0].read(Address::new(0), &mut row0).unwrap();
        assert_eq!(f32::from_le_bytes(row0), 1.0);
        let mut row1 = [0u8; 4];
        l1[0].read(Address::new(12), &mut row1).unwrap();
        assert_eq!(f32::from_le_bytes(row1), 4.0);
    }

    #[test]
    fn out_stream_moves_l1_to_l2() {
        let mut streamer = Streamer::new(0);
        let mut l2 = vec![L2Bank::new(1024)];
        let mut l1 = vec![L1Buffer::new(1024)];
        l1[0].write(Address::new(0), &9.0f32.to_le_bytes()).unwrap();
        l1[0].write(Address::new(4), &8.0f32.to_le_bytes()).unwrap();
        l1[0].write(Address::new(8), &7.0f32.to_le_bytes()).unwrap();
        l1[0].write(Address::new(12), &6.0f32.to_le_bytes()).unwrap();

        streamer.enqueue(StreamJob {
            instruction_id: None,
            kind: StreamKind::Out,
            src_id: 0,
            dst_id: 0,
            geometry: geometry(),
        });

        for cycle in 0..10 {
            if streamer.update(cycle, &mut l2, &mut l1).unwrap().is_some() {
                break;
            }
        }
        let mut out = [0u8; 16];
        l2[0].read(Address::new(0), &mut out).unwrap();
        assert_eq!(f32::from_le_bytes(out[0..4].try_into().unwrap()), 9.0);
        assert_eq!(f32::from_le_bytes(out[12..16].try_into().unwrap()), 6.0);
    }
}
