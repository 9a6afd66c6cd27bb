use super::{Data, Dependency, RddBase, RddId, RddIndex, RddWorkFns, TypedNarrowRddWork, TypedRdd};

/// Imagine you have Rdd<Line> and want to get Rdd<Record> with zero or more records per line. In
/// this case each map takes one element from the previous Rdd and outputs something iterable,
/// that's why we have `OutIterable`. It is flattened by `flat_map` itself, following the api of
/// rust's iterators `flat_map`.
pub trait FlatMapper: Send + Sync + 'static {
    type In: Data;
    type OutIterable: IntoIterator;

    fn map(&self, v: Self::In) -> Self::OutIterable;
}

#[derive(Clone)]
pub struct FnPtrFlatMapper<T, I>(pub fn(T) -> I);

impl<T, U, I> FlatMapper for FnPtrFlatMapper<T, I>
where
    T: Data,
    U: Data,
    I: IntoIterator<Item = U> + 'static,
{
    type In = T;

    type OutIterable = I;

    fn map(&self, v: Self::In) -> Self::OutIterable {
        self.0(v)
    }
}

#[derive(Clone)]
pub struct FlatMapRdd<T, U, M> {
    pub idx: RddIndex<U>,
    pub prev: RddIndex<T>,
    pub partitions_num: usize,
    pub flat_mapper: M,
}

impl<T, U, M, I> TypedRdd for FlatMapRdd<T, U, M>
where
    T: Data,
    U: Data,
    I: IntoIterator<Item = U>,
    M: FlatMapper<In = T, OutIterable = I>,
{
    type Item = U;
}

impl<T, U, M, I> TypedNarrowRddWork for FlatMapRdd<T, U, M>
where
    T: Data,
    U: Data,
    I: IntoIterator<Item = U>,
    M: FlatMapper<In = T, OutIterable = I>,
{
    type InputItem = T;
    type OutputItem = U;

    fn work(
        &self,
        input_partition: Option<Vec<Self::InputItem>>,
        _partition_id: usize,
    ) -> Vec<Self::OutputItem> {
        input_partition
            .into_iter()
            .flatten()
            .flat_map(|v| self.flat_mapper.map(v))
            .collect()
    }
}

impl<T, U, M, I> RddBase for FlatMapRdd<T, U, M>
where
    T: Data,
    U: Data,
    I: IntoIterator<Item = U>,
    M: FlatMapper<In = T, OutIterable = I>,
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
