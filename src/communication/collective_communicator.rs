pub trait CollectiveCommunicator<T> {
    /// Gather one item from every worker, ordered by rank.
    fn all_gather(&mut self, data: &T) -> Vec<T>;
    /// Gather a variable-length list from every worker, ordered by rank.
    fn all_gather_vec(&mut self, data: &[T]) -> Vec<Vec<T>>;
}

pub trait SumCommunicator<T> {
    fn collective_sum(&mut self, send: &T) -> T;
}
