use bigrams::{
    core::{
        context::Context,
        rdd::map_rdd::Mapper,
        spark::{hash_partitioner::HashPartitioner, Spark},
    },
    pipeline, Config,
};

struct MakeTuple;

impl Mapper for MakeTuple {
    type In = String;

    type Out = (String, u64);

    fn map(&self, v: Self::In) -> Self::Out {
        (v, 1)
    }
}

#[tokio::main]
async fn main() {
    let config = Config::default();
    let mut spark = Spark::new(&config).await;

    let lines = spark.parallelize(pipeline::toy_corpus(), config.partitions);
    let words = spark.flat_map(lines, |line| pipeline::tokenize(&line));
    let pairs = spark.map_with_state(words, MakeTuple);
    let summed = spark.sum_by_key(pairs, HashPartitioner::new(config.partitions));
    match spark.collect(summed).await {
        Ok(mut counts) => {
            counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            for (word, count) in counts {
                println!("{word}:{count}");
            }
        }
        Err(e) => eprintln!("word count failed: {e}"),
    }
}
