mod assemble;
mod ingest;
mod pool;
