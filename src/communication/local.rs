use std::marker::PhantomData;
use std::mem;
use std::ptr;
use std::slice;
use std::sync::mpsc::channel;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::Sender;

use super::collective_communicator::SumCommunicator;
use super::CollectiveCommunicator;
use super::DataByRank;
use super::Rank;
use super::SizedCommunicator;
use super::Tag;
use super::WorldCommunicator;

pub(super) struct Payload {
    bytes: Vec<u8>,
}

/// Messages cross thread boundaries as raw bytes, which restricts
/// payloads to plain `Copy` data.
fn encode<T>(data: &[T]) -> Vec<u8> {
    unsafe { slice::from_raw_parts(data.as_ptr().cast::<u8>(), mem::size_of_val(data)) }.to_vec()
}

fn decode<T: Copy>(bytes: &[u8]) -> Vec<T> {
    let item_size = mem::size_of::<T>();
    debug_assert_eq!(bytes.len() % item_size, 0);
    bytes
        .chunks_exact(item_size)
        .map(|chunk| unsafe { ptr::read_unaligned(chunk.as_ptr().cast()) })
        .collect()
}

/// A communicator connecting the worker threads of one process through
/// unbounded channels.
pub struct LocalCommunicator<T> {
    senders: DataByRank<Sender<Payload>>,
    receivers: DataByRank<Receiver<Payload>>,
    rank: Rank,
    size: usize,
    tag: Tag,
    marker_: PhantomData<T>,
}

impl<T> LocalCommunicator<T> {
    pub(super) fn new(
        receivers: DataByRank<Receiver<Payload>>,
        senders: DataByRank<Sender<Payload>>,
        tag: Tag,
        size: usize,
        rank: Rank,
    ) -> Self {
        Self {
            senders,
            receivers,
            rank,
            size,
            tag,
            marker_: PhantomData,
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }
}

/// One communicator per worker, fully meshed. Every logical exchange
/// phase gets its own mesh (distinguished by the tag) so messages of
/// different phases cannot be confused.
pub fn build_local_communicators<T>(size: usize, tag: Tag) -> Vec<LocalCommunicator<T>> {
    let mut senders_by_rank: Vec<DataByRank<Sender<Payload>>> =
        (0..size).map(|_| DataByRank::empty()).collect();
    let mut receivers_by_rank: Vec<DataByRank<Receiver<Payload>>> =
        (0..size).map(|_| DataByRank::empty()).collect();
    for sender_rank in 0..size {
        for receiver_rank in 0..size {
            if sender_rank == receiver_rank {
                continue;
            }
            let (sender, receiver) = channel();
            senders_by_rank[sender_rank].insert(receiver_rank as Rank, sender);
            receivers_by_rank[receiver_rank].insert(sender_rank as Rank, receiver);
        }
    }
    receivers_by_rank
        .into_iter()
        .zip(senders_by_rank)
        .enumerate()
        .map(|(rank, (receivers, senders))| {
            LocalCommunicator::new(receivers, senders, tag, size, rank as Rank)
        })
        .collect()
}

impl<T: Copy + Sync + Send> WorldCommunicator<T> for LocalCommunicator<T> {
    fn receive_vec(&mut self, rank: Rank) -> Vec<T> {
        let payload = self.receivers[rank].recv().unwrap();
        decode(&payload.bytes)
    }

    fn send_vec(&mut self, rank: Rank, data: Vec<T>) {
        let payload = Payload {
            bytes: encode(&data),
        };
        self.senders[rank].send(payload).unwrap();
    }
}

impl<T> SizedCommunicator for LocalCommunicator<T> {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }
}

impl<T: Copy + Sync + Send> CollectiveCommunicator<T> for LocalCommunicator<T> {
    fn all_gather(&mut self, data: &T) -> Vec<T> {
        for rank in self.other_ranks() {
            self.send_vec(rank, vec![*data]);
        }
        let mut result = vec![];
        for rank in self.all_ranks() {
            if rank == self.rank {
                result.push(*data);
            } else {
                let received = self.receive_vec(rank);
                assert_eq!(received.len(), 1);
                result.extend(received);
            }
        }
        result
    }

    fn all_gather_vec(&mut self, data: &[T]) -> Vec<Vec<T>> {
        for rank in self.other_ranks() {
            self.send_vec(rank, data.to_vec());
        }
        let mut result = vec![];
        for rank in self.all_ranks() {
            if rank == self.rank {
                result.push(data.to_vec());
            } else {
                result.push(self.receive_vec(rank));
            }
        }
        result
    }
}

impl<T: Copy + Sync + Send + std::iter::Sum> SumCommunicator<T> for LocalCommunicator<T> {
    fn collective_sum(&mut self, send: &T) -> T {
        // Channel transport makes a reduction tree pointless; gather
        // everything and fold on every rank.
        self.all_gather(send).into_iter().sum()
    }
}
