mod collective_communicator;
mod data_by_rank;
mod exchange_communicator;
mod local;
mod sized_communicator;
mod world_communicator;

pub use collective_communicator::CollectiveCommunicator;
pub use collective_communicator::SumCommunicator;
pub use data_by_rank::DataByRank;
pub use local::build_local_communicators;
pub use local::LocalCommunicator;
pub use sized_communicator::SizedCommunicator;
pub use world_communicator::WorldCommunicator;

pub type Rank = i32;
pub type Tag = i32;

pub type Communicator<T> = LocalCommunicator<T>;
pub type ExchangeCommunicator<T> =
    exchange_communicator::ExchangeCommunicator<LocalCommunicator<T>, T>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct WorldRank(pub Rank);

impl WorldRank {
    pub fn is_main(&self) -> bool {
        self.0 == 0
    }

    pub fn main() -> Rank {
        0
    }
}
