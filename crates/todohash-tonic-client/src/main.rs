#![doc = include_str!("../README.md")]

use anyhow::Context;
use clap::{Parser, Subcommand};
use core::time::Duration;
use std::time::Instant;
use todohash_tonic_core::{
    proto::{
        self, AddRecordRequest, DeleteOwnerRecordsRequest, Empty, HashOwnerRecordsRequest,
        ListOwnerRecordsRequest, record_service_client::RecordServiceClient,
    },
    todohash::{HashedRecord, OwnerId, UNASSIGNED_ID},
};
use tokio_stream::StreamExt;
use tonic::{Request, codec::CompressionEncoding, transport::Channel};

#[derive(Parser, Debug)]
#[command(
    name = "todohash-client",
    version,
    about = "Command-line client for the todohash record service"
)]
struct CliArgs {
    /// Server endpoint.
    ///
    /// Environment variable: `SERVER_URL`
    #[arg(long, env = "SERVER_URL", default_value_t = String::from("http://127.0.0.1:50051"))]
    server_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a record for an owner.
    Add {
        owner_id: OwnerId,
        /// Record payload; multiple words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        payload: Vec<String>,
    },
    /// List every record.
    List,
    /// Stream every record, one per server tick.
    ListPaced,
    /// Stream owner ids to the server and print each owner's records.
    ListOwners {
        #[arg(required = true, num_args = 1..)]
        owner_ids: Vec<OwnerId>,
    },
    /// Delete every record of an owner.
    Delete { owner_id: OwnerId },
    /// Hash every record of an owner.
    Hash {
        owner_id: OwnerId,
        /// Client-side deadline sent as `grpc-timeout`.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();

    let channel = Channel::from_shared(args.server_url.clone())
        .context("invalid server url")?
        .connect()
        .await
        .with_context(|| format!("failed to connect to {}", args.server_url))?;
    let mut client = RecordServiceClient::new(channel)
        .send_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Zstd);

    match args.command {
        Command::Add { owner_id, payload } => {
            let record = proto::Record {
                id: UNASSIGNED_ID,
                owner_id,
                payload: payload.join(" "),
            };
            let stored = client
                .add_record(AddRecordRequest {
                    record: Some(record),
                })
                .await?
                .into_inner()
                .record
                .context("server returned no record")?;
            print_record(&stored);
        }
        Command::List => {
            let records = client.list_records(Empty {}).await?.into_inner().records;
            if records.is_empty() {
                println!("(no records)");
            }
            records.iter().for_each(print_record);
        }
        Command::ListPaced => {
            let mut stream = client.list_records_paced(Empty {}).await?.into_inner();
            while let Some(record) = stream.next().await {
                print_record(&record?);
            }
        }
        Command::ListOwners { owner_ids } => {
            let outbound = tokio_stream::iter(
                owner_ids
                    .into_iter()
                    .map(|owner_id| ListOwnerRecordsRequest { owner_id }),
            );
            let mut stream = client.list_owner_records(outbound).await?.into_inner();
            while let Some(response) = stream.next().await {
                let response = response?;
                println!(
                    "owner {}: {} record(s)",
                    response.owner_id,
                    response.records.len()
                );
                response.records.iter().for_each(print_record);
            }
        }
        Command::Delete { owner_id } => {
            client
                .delete_owner_records(DeleteOwnerRecordsRequest { owner_id })
                .await?;
            println!("Deleted records of owner {owner_id}");
        }
        Command::Hash {
            owner_id,
            timeout_ms,
        } => {
            let mut request = Request::new(HashOwnerRecordsRequest { owner_id });
            if let Some(ms) = timeout_ms {
                request.set_timeout(Duration::from_millis(ms));
            }

            let start = Instant::now();
            let response = client.hash_owner_records(request).await?.into_inner();
            let elapsed = start.elapsed();

            for hashed in response.records {
                let hashed = HashedRecord::try_from(hashed)?;
                println!(
                    "{:>6} | {:>6} | {:>6} | {}",
                    hashed.record.id, hashed.record.owner_id, hashed.hash, hashed.record.payload
                );
            }
            println!("Hashed in {:.2} ms", elapsed.as_secs_f64() * 1000.0);
        }
    }

    Ok(())
}

fn print_record(record: &proto::Record) {
    println!(
        "{:>6} | {:>6} | {}",
        record.id, record.owner_id, record.payload
    );
}
