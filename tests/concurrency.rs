#![allow(clippy::expect_used, clippy::unwrap_used)]

use cipherline::config::SessionConfig;
use cipherline::core::cipher::{CipherOperation, CipherPipeline, CipherSpec};
use cipherline::protocol::selection::SelectionHandler;
use cipherline::protocol::Session;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_sessions_do_not_share_state() {
    use tokio::task::JoinSet;

    let sessions = 64u8;
    let requests = 200usize;

    let mut tasks = JoinSet::new();
    for id in 0..sessions {
        tasks.spawn(async move {
            let spec = CipherSpec::new(vec![
                CipherOperation::XorConstant(id.wrapping_add(1)),
                CipherOperation::AddPosition,
            ])
            .unwrap();

            let (mut client, server) = duplex(256);
            let server_task = tokio::spawn(async move {
                let mut server = server;
                Session::ciphered(SelectionHandler::new(), SessionConfig::default())
                    .run(&mut server)
                    .await
            });

            let mut cipher = CipherPipeline::new(spec.clone());
            client.write_all(&spec.to_bytes()).await.unwrap();

            for i in 0..requests {
                let expected = format!("{}x{id}-{i}\n", i + 1);
                let mut line = format!("{i}xlow,{}x{id}-{i},1xother\n", i + 1).into_bytes();
                cipher.encode(&mut line);
                client.write_all(&line).await.unwrap();

                let mut response = vec![0u8; expected.len()];
                client.read_exact(&mut response).await.unwrap();
                cipher.decode(&mut response);
                assert_eq!(response, expected.as_bytes());
            }

            client.shutdown().await.unwrap();
            let mut rest = Vec::new();
            client.read_to_end(&mut rest).await.unwrap();
            assert!(rest.is_empty());
            server_task.await.unwrap().unwrap();
        });
    }

    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }
}
