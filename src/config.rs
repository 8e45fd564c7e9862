#[cfg(feature = "1d")]
pub const NUM_DIMENSIONS: usize = 1;
#[cfg(feature = "2d")]
pub const NUM_DIMENSIONS: usize = 2;
#[cfg(all(not(feature = "1d"), not(feature = "2d")))]
pub const NUM_DIMENSIONS: usize = 3;

pub const TWO_TO_NUM_DIMENSIONS: usize = 2usize.pow(NUM_DIMENSIONS as u32);
