use std::marker::PhantomData;

use super::DataByRank;
use super::Rank;
use super::SizedCommunicator;
use super::WorldCommunicator;

/// Sparse all-to-all: every worker sends a (possibly empty) list to
/// every other worker and receives one back. Used for ghost payloads and
/// particle migration.
pub struct ExchangeCommunicator<C, T> {
    pub communicator: C,
    _marker: PhantomData<T>,
}

impl<C, T> ExchangeCommunicator<C, T>
where
    C: WorldCommunicator<T> + SizedCommunicator,
{
    pub fn new(communicator: C) -> Self {
        Self {
            communicator,
            _marker: PhantomData,
        }
    }

    pub fn exchange_all(&mut self, mut data: DataByRank<Vec<T>>) -> DataByRank<Vec<T>> {
        for rank in self.communicator.other_ranks() {
            let items = data.remove(&rank).unwrap_or_default();
            self.communicator.send_vec(rank, items);
        }
        let mut received = DataByRank::empty();
        for rank in self.communicator.other_ranks() {
            received.insert(rank, self.communicator.receive_vec(rank));
        }
        received
    }
}

impl<C, T> SizedCommunicator for ExchangeCommunicator<C, T>
where
    C: SizedCommunicator,
{
    fn rank(&self) -> Rank {
        self.communicator.rank()
    }

    fn size(&self) -> usize {
        self.communicator.size()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::ExchangeCommunicator;
    use crate::communication::build_local_communicators;
    use crate::communication::DataByRank;
    use crate::communication::Rank;
    use crate::communication::SizedCommunicator;

    #[test]
    fn exchange_communicator() {
        let num_threads = 4 as i32;
        let communicators = build_local_communicators(num_threads as usize, 0);
        let threads: Vec<_> = communicators
            .into_iter()
            .enumerate()
            .map(|(rank, communicator)| {
                let rank = rank as Rank;
                let mut communicator = ExchangeCommunicator::new(communicator);
                thread::spawn(move || {
                    let wrap = |x: i32| x.rem_euclid(num_threads);
                    let target_rank = wrap(rank + 1);
                    let mut outgoing = DataByRank::from_size_and_rank(
                        communicator.size(),
                        communicator.rank(),
                    );
                    outgoing.insert(target_rank, vec![rank, wrap(rank + 1)]);
                    let received = communicator.exchange_all(outgoing);
                    for other_rank in communicator.other_ranks() {
                        if other_rank == wrap(rank - 1) {
                            assert_eq!(
                                received.get(&other_rank).unwrap(),
                                &vec![wrap(rank - 1), rank]
                            );
                        } else {
                            assert_eq!(received.get(&other_rank).unwrap(), &Vec::<i32>::new());
                        }
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
    }
}
