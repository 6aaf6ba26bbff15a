//! HTTP tests for the co-signer service
//!
//! Each test binds the router on an ephemeral port and talks to it with a
//! real HTTP client, including the crate's own `RemoteCoSigner`.

mod common;

use common::MockLedger;
use gasless_swap::gasless::{
    assemble_swap, sign_as_user, CoSignPolicy, CoSignRequest, CoSignResponse, CoSignTransport,
    CoSigner, FeePayerStatus, GaslessSwapClient, InstructionDescriptor, RemoteCoSigner,
    SwapInstructions,
};
use gasless_swap::observability::CORRELATION_HEADER;
use gasless_swap::rpc::LedgerClient;
use gasless_swap::server::{serve, AppState};
use serde_json::{json, Value};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

const FUNDED: u64 = 50_000_000;

struct TestServer {
    base_url: String,
    ledger: Arc<MockLedger>,
    fee_payer: Keypair,
    http: reqwest::Client,
}

async fn start(balance: u64, enable_metrics: bool) -> TestServer {
    let ledger = Arc::new(MockLedger::with_balance(balance));
    let fee_payer = Keypair::new();
    let policy = CoSignPolicy {
        retry_base_delay: Duration::from_millis(1),
        confirm_poll_interval: Duration::from_millis(1),
        ..CoSignPolicy::default()
    };
    let shared: Arc<dyn LedgerClient> = ledger.clone();
    let cosigner = Arc::new(CoSigner::new(
        shared,
        Arc::new(fee_payer.insecure_clone()),
        policy,
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, AppState::new(cosigner, enable_metrics)));

    TestServer {
        base_url: format!("http://{}", addr),
        ledger,
        fee_payer,
        http: reqwest::Client::new(),
    }
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn user_signed_request(&self, user: &Keypair) -> CoSignRequest {
        let swap = Instruction::new_with_bytes(
            Pubkey::new_unique(),
            &[9, 9],
            vec![
                AccountMeta::new(user.pubkey(), true),
                AccountMeta::new(Pubkey::new_unique(), false),
            ],
        );
        let groups = gasless_swap::gasless::InstructionGroups {
            swap: vec![swap],
            ..Default::default()
        };
        let recent = self.ledger.get_latest_blockhash().await.unwrap();
        let assembled = assemble_swap(groups, &[], &self.fee_payer.pubkey(), recent).unwrap();
        let signed = sign_as_user(assembled, user).await.unwrap();
        CoSignRequest::new(
            signed.to_base64().unwrap(),
            Some(signed.last_valid_block_height()),
        )
    }
}

#[tokio::test]
async fn test_health() {
    let server = start(FUNDED, false).await;

    let response = server.http.get(server.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["feePayerAddress"], server.fee_payer.pubkey().to_string());
}

#[tokio::test]
async fn test_fee_payer_status_flags_top_up() {
    let server = start(2_000_000, false).await;

    let status: FeePayerStatus = server
        .http
        .get(server.url("/fee-payer"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(status.fee_payer().unwrap(), server.fee_payer.pubkey());
    assert_eq!(status.balance, 2_000_000);
    assert_eq!(status.min_balance, 10_000_000);
    assert!(status.needs_top_up);
}

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let server = start(FUNDED, false).await;

    let response = server
        .http
        .post(server.url("/sign-and-send-solana"))
        .header("content-type", "application/json")
        .body("{\"serializedTransaction\": 42")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: CoSignResponse = response.json().await.unwrap();
    assert!(!body.success);
    assert_eq!(body.error_kind.as_deref(), Some("malformed_transaction"));
    assert_eq!(server.ledger.send_calls(), 0);
}

#[tokio::test]
async fn test_undecodable_transaction_is_bad_request() {
    let server = start(FUNDED, false).await;

    let response = server
        .http
        .post(server.url("/sign-and-send-solana"))
        .json(&json!({ "serializedTransaction": "AAAA" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: CoSignResponse = response.json().await.unwrap();
    assert_eq!(body.error_kind.as_deref(), Some("malformed_transaction"));
}

#[tokio::test]
async fn test_sign_and_send_echoes_correlation_id() {
    let server = start(FUNDED, false).await;
    let user = Keypair::new();
    let request = server.user_signed_request(&user).await;

    let response = server
        .http
        .post(server.url("/sign-and-send-solana"))
        .header(CORRELATION_HEADER, "swap-1234")
        .json(&request)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get(CORRELATION_HEADER)
            .and_then(|v| v.to_str().ok()),
        Some("swap-1234")
    );
    let body: CoSignResponse = response.json().await.unwrap();
    assert!(body.success, "co-sign failed: {:?}", body.error);
    assert_eq!(body.signature(), Some(server.ledger.sent()[0].signatures[0]));
}

#[tokio::test]
async fn test_insufficient_balance_is_reported_in_body() {
    let server = start(1_000, false).await;
    let user = Keypair::new();
    let request = server.user_signed_request(&user).await;

    let response = server
        .http
        .post(server.url("/sign-and-send-solana"))
        .json(&request)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["needsTopUp"], true);
    assert_eq!(body["currentBalance"], 1_000);
    assert_eq!(body["requiredBalance"], 10_000_000);
    assert_eq!(body["feePayerAddress"], server.fee_payer.pubkey().to_string());
    assert!(body.get("transactionSignature").is_none());
}

#[tokio::test]
async fn test_metrics_endpoint_toggle() {
    let disabled = start(FUNDED, false).await;
    let response = disabled.http.get(disabled.url("/metrics")).send().await.unwrap();
    assert_eq!(response.status(), 404);

    let enabled = start(FUNDED, true).await;
    let response = enabled.http.get(enabled.url("/metrics")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let text = response.text().await.unwrap();
    assert!(text.contains("cosign_requests_total"));
}

#[tokio::test]
async fn test_remote_cosigner_against_service() {
    let server = start(FUNDED, false).await;
    let remote = Arc::new(RemoteCoSigner::new(server.base_url.clone(), Duration::from_secs(5)).unwrap());
    assert_eq!(remote.fee_payer().await.unwrap(), server.fee_payer.pubkey());

    let user = Keypair::new();
    let swap = Instruction::new_with_bytes(
        Pubkey::new_unique(),
        &[1],
        vec![AccountMeta::new(user.pubkey(), true)],
    );
    let instructions = SwapInstructions {
        compute_budget_instructions: Vec::new(),
        setup_instructions: Vec::new(),
        swap_instruction: Some(InstructionDescriptor {
            program_id: swap.program_id.to_string(),
            accounts: vec![gasless_swap::gasless::normalize::AccountDescriptor {
                pubkey: user.pubkey().to_string(),
                is_signer: true,
                is_writable: true,
            }],
            data: "AQ==".to_string(),
        }),
        cleanup_instruction: None,
        address_lookup_table_addresses: Vec::new(),
    };

    let client = GaslessSwapClient::new(server.ledger.clone(), remote);
    let response = client.execute(&instructions, &user).await.unwrap();

    assert!(response.success, "co-sign failed: {:?}", response.error);
    let sent = server.ledger.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].message.static_account_keys()[0], server.fee_payer.pubkey());
}
