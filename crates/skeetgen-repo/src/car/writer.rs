//! CAR writing utilities
//!
//! Only used to assemble repository exports in memory, mostly for fixtures.

use crate::error::{RepoError, Result};
use bytes::Bytes;
use cid::Cid as IpldCid;
use iroh_car::{CarHeader, CarWriter};

/// Encode a CAR v1 with `root` as its only root
///
/// Blocks are written in iteration order; pass a `BTreeMap` for output that
/// is stable across runs.
pub async fn write_car_bytes(
    root: IpldCid,
    blocks: impl IntoIterator<Item = (IpldCid, Bytes)>,
) -> Result<Vec<u8>> {
    let mut car = CarWriter::new(CarHeader::new_v1(vec![root]), Vec::new());
    for (cid, data) in blocks {
        car.write(cid, &data).await.map_err(RepoError::car)?;
    }
    car.finish().await.map_err(RepoError::car)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mst::util::compute_cid;

    #[tokio::test]
    async fn test_header_names_root() {
        let data = Bytes::from_static(&[9, 9, 9]);
        let cid = compute_cid(&data).unwrap();

        let bytes = write_car_bytes(cid, [(cid, data)]).await.unwrap();

        let reader = iroh_car::CarReader::new(bytes.as_slice()).await.unwrap();
        assert_eq!(reader.header().roots(), &[cid]);
    }
}
