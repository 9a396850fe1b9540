mod concurrency;
mod dry_run;
mod transfer;
