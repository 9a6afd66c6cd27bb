use super::{Data, Dependency, RddBase, RddId, RddIndex, RddWorkFns, TypedNarrowRddWork, TypedRdd};

pub trait Mapper: Send + Sync + 'static {
    type In: Data;
    type Out: Data;

    fn map(&self, v: Self::In) -> Self::Out;
}

#[derive(Clone)]
pub struct FnPtrMapper<T, U>(pub fn(T) -> U);

impl<T, U> Mapper for FnPtrMapper<T, U>
where
    T: Data,
    U: Data,
{
    type In = T;

    type Out = U;

    fn map(&self, v: Self::In) -> Self::Out {
        self.0(v)
    }
}

#[derive(Clone)]
pub struct MapRdd<T, U, M> {
    pub idx: RddIndex<U>,
    pub prev: RddIndex<T>,
    pub partitions_num: usize,
    pub mapper: M,
}

impl<T, U, M> TypedRdd for MapRdd<T, U, M>
where
    T: Data,
    U: Data,
    M: Mapper<In = T, Out = U>,
{
    type Item = U;
}

impl<T, U, M> TypedNarrowRddWork for MapRdd<T, U, M>
where
    T: Data,
    U: Data,
    M: Mapper<In = T, Out = U>,
{
    type InputItem = T;
    type OutputItem = U;

    fn work(&self, input_partition: Option<Vec<T>>, _partition_id: usize) -> Vec<U> {
        input_partition
            .into_iter()
            .flatten()
            .map(|v| self.mapper.map(v))
            .collect()
    }
}

impl<T, U, M> RddBase for MapRdd<T, U, M>
where
    T: Data,
    U: Data,
    M: Mapper<In = T, Out = U>,
{
    fn id(&self) -> RddId {
        self.idx.id
    }

    fn rdd_dependency(&self) -> Dependency {
        Dependency::Narrow(self.prev.id)
    }

    fn partitions_num(&self) -> usize {
        self.partitions_num
    }

    fn work_fns(&self) -> RddWorkFns {
        RddWorkFns::Narrow(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Square;

    impl Mapper for Square {
        type In = u64;

        type Out = u64;

        fn map(&self, v: Self::In) -> Self::Out {
            v * v
        }
    }

    #[test]
    fn test_mapper_keeps_partition_order() {
        let rdd = MapRdd {
            idx: RddIndex::new(RddId::new()),
            prev: RddIndex::new(RddId::new()),
            partitions_num: 1,
            mapper: Square,
        };
        assert_eq!(rdd.work(Some(vec![3, 1, 2]), 0), vec![9, 1, 4]);
        assert!(rdd.work(None, 0).is_empty());
    }

    #[test]
    fn test_fn_ptr_mapper() {
        let mapper = FnPtrMapper::<String, usize>(|s| s.len());
        assert_eq!(mapper.map("bigram".to_string()), 6);
    }
}
