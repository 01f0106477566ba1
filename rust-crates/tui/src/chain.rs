use std::sync::Arc;

use async_trait::async_trait;
use ethers::{
    abi::{
        RawLog,
        Token,
    },
    contract::{
        ContractCall,
        ContractError,
    },
    middleware::SignerMiddleware,
    providers::{
        Http,
        Middleware,
        Provider,
    },
    signers::{
        LocalWallet,
        Signer,
    },
    types::{
        Address,
        TransactionReceipt,
        U64,
        U256,
    },
};
use generated_abi::{
    ROLL_EVENT,
    roulette_instance,
    roulette_types::{
        Bet as WireBet,
        Roulette,
    },
    unauthorized_account_selector,
};
use tracing::debug;

use crate::{
    bet::BetSubmission,
    connection::WalletSession,
    game_state::GameState,
    network::NetworkConfig,
    remote::{
        RawRoll,
        RemoteError,
        RollReceipt,
        RouletteContract,
        TxReceipt,
        u256_to_u128,
    },
};

/// Rolls carry many bets and the default estimate is often too tight.
pub const ROLL_GAS_LIMIT: u64 = 500_000;

const GENERIC_RPC_ERROR: &str = "Internal JSON-RPC error";
const GENERIC_RPC_HINT: &str = "Transaction failed. Please check your balance and try again.";

pub type SignedClient = SignerMiddleware<Provider<Http>, LocalWallet>;

pub fn connect_provider(rpc_url: &str) -> Result<Provider<Http>, RemoteError> {
    Provider::<Http>::try_from(rpc_url)
        .map_err(|e| RemoteError::Transport(format!("invalid RPC URL {rpc_url}: {e}")))
}

pub fn signed_client(
    provider: Provider<Http>,
    signer: LocalWallet,
    chain_id: u64,
) -> Arc<SignedClient> {
    Arc::new(SignerMiddleware::new(provider, signer.with_chain_id(chain_id)))
}

/// Turns a failed call into the revert reason the contract gave, when it gave one.
pub fn map_contract_error<M: Middleware>(err: ContractError<M>) -> RemoteError {
    if let Some(reason) = err.decode_revert::<String>() {
        return RemoteError::Rejected { reason };
    }
    if let Some(data) = err.as_revert() {
        if data.len() >= 4 && data[..4] == unauthorized_account_selector() {
            let account = data
                .get(16..36)
                .map(Address::from_slice)
                .unwrap_or_default();
            return RemoteError::Rejected {
                reason: format!("OwnableUnauthorizedAccount({account:?}): caller is not the owner"),
            };
        }
        return RemoteError::Rejected {
            reason: format!("execution reverted (0x{})", hex::encode(data)),
        };
    }
    let message = err.to_string();
    if let Some(reason) = reason_from_message(&message) {
        return RemoteError::Rejected { reason };
    }
    if message.contains(GENERIC_RPC_ERROR) {
        return RemoteError::Rejected {
            reason: GENERIC_RPC_HINT.to_string(),
        };
    }
    RemoteError::Transport(message)
}

/// Nodes that do not return revert data still quote the reason in the message,
/// e.g. `reverted with reason string 'No bets provided'`.
fn reason_from_message(message: &str) -> Option<String> {
    let marker = "reverted with reason string '";
    let start = message.find(marker)? + marker.len();
    let end = message[start..].find('\'')?;
    Some(message[start..start + end].to_string())
}

fn transport<E: std::fmt::Display>(err: E) -> RemoteError {
    RemoteError::Transport(err.to_string())
}

pub struct EthersRoulette {
    contract: Roulette<SignedClient>,
    address: Address,
    account: Address,
}

impl EthersRoulette {
    pub fn new(address: Address, account: Address, client: Arc<SignedClient>) -> Self {
        Self {
            contract: roulette_instance(address, client),
            address,
            account,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Account the transactions are signed for.
    pub fn account(&self) -> Address {
        self.account
    }

    async fn send(
        &self,
        call: ContractCall<SignedClient, ()>,
    ) -> Result<TransactionReceipt, RemoteError> {
        let pending = call.send().await.map_err(map_contract_error)?;
        let receipt = pending.await.map_err(transport)?.ok_or(RemoteError::Dropped)?;
        if receipt.status == Some(U64::zero()) {
            return Err(RemoteError::Rejected {
                reason: format!(
                    "transaction {:#x} reverted",
                    receipt.transaction_hash
                ),
            });
        }
        debug!(tx = ?receipt.transaction_hash, gas_used = ?receipt.gas_used, "transaction mined");
        Ok(receipt)
    }

    async fn transact(
        &self,
        call: ContractCall<SignedClient, ()>,
    ) -> Result<TxReceipt, RemoteError> {
        let receipt = self.send(call).await?;
        Ok(TxReceipt {
            tx_hash: Some(format!("{:#x}", receipt.transaction_hash)),
        })
    }

    /// First `Roll` event emitted by this contract for this account.
    fn roll_event(&self, receipt: &TransactionReceipt) -> Result<Option<RawRoll>, RemoteError> {
        let event = self
            .contract
            .abi()
            .event(ROLL_EVENT)
            .map_err(|e| RemoteError::Malformed(e.to_string()))?;
        for log in receipt.logs.iter().filter(|log| log.address == self.address) {
            let raw = RawLog {
                topics: log.topics.clone(),
                data: log.data.to_vec(),
            };
            let Ok(parsed) = event.parse_log(raw) else {
                continue;
            };
            let mut player = None;
            let mut result = None;
            for param in parsed.params {
                match param.name.as_str() {
                    "player" => player = param.value.into_address(),
                    "result" => result = Some(param.value),
                    _ => {}
                }
            }
            if player.is_some_and(|player| player != self.account) {
                continue;
            }
            return match result {
                Some(Token::Tuple(fields)) => raw_roll_from_tokens(fields).map(Some),
                other => Err(RemoteError::Malformed(format!(
                    "Roll event result has unexpected shape: {other:?}"
                ))),
            };
        }
        Ok(None)
    }
}

fn raw_roll_from_tokens(fields: Vec<Token>) -> Result<RawRoll, RemoteError> {
    let mut fields = fields.into_iter();
    let random_number = fields
        .next()
        .and_then(Token::into_uint)
        .ok_or_else(|| RemoteError::Malformed("Roll event has no random number".to_string()))?;
    let bet_results = fields
        .next()
        .and_then(Token::into_array)
        .ok_or_else(|| RemoteError::Malformed("Roll event has no bet results".to_string()))?
        .into_iter()
        .map(|token| {
            token
                .into_uint()
                .ok_or_else(|| RemoteError::Malformed("bet result is not a uint".to_string()))
        })
        .collect::<Result<Vec<U256>, _>>()?;
    Ok(RawRoll {
        random_number,
        bet_results,
    })
}

#[async_trait]
impl RouletteContract for EthersRoulette {
    async fn game_state(&self) -> Result<GameState, RemoteError> {
        let (bank_balance, total_player_balances, max_bet, withdrawal_fee, player_balance) = self
            .contract
            .get_game_state()
            .call()
            .await
            .map_err(map_contract_error)?;
        Ok(GameState {
            bank_balance: u256_to_u128(bank_balance, "bankBalance")?,
            total_player_balances: u256_to_u128(
                total_player_balances,
                "totalPlayerBalances",
            )?,
            max_bet: u256_to_u128(max_bet, "maxBet")?,
            withdrawal_fee: u256_to_u128(withdrawal_fee, "withdrawalFee")?,
            player_balance: u256_to_u128(player_balance, "playerBalance")?,
        })
    }

    async fn owner(&self) -> Result<Address, RemoteError> {
        self.contract
            .owner()
            .call()
            .await
            .map_err(map_contract_error)
    }

    async fn deposit(&self, amount: u128) -> Result<TxReceipt, RemoteError> {
        self.transact(self.contract.deposit().value(U256::from(amount)))
            .await
    }

    async fn withdraw(&self, amount: u128) -> Result<TxReceipt, RemoteError> {
        self.transact(self.contract.withdraw(U256::from(amount))).await
    }

    async fn deposit_to_bank(&self, amount: u128) -> Result<TxReceipt, RemoteError> {
        self.transact(self.contract.deposit_to_bank().value(U256::from(amount)))
            .await
    }

    async fn withdraw_from_bank(&self, amount: u128) -> Result<TxReceipt, RemoteError> {
        self.transact(self.contract.withdraw_from_bank(U256::from(amount)))
            .await
    }

    async fn set_max_bet(&self, amount: u128) -> Result<TxReceipt, RemoteError> {
        self.transact(self.contract.set_max_bet(U256::from(amount)))
            .await
    }

    async fn set_withdrawal_fee(&self, amount: u128) -> Result<TxReceipt, RemoteError> {
        self.transact(self.contract.set_withdrawal_fee(U256::from(amount)))
            .await
    }

    async fn roll(&self, bets: &[BetSubmission]) -> Result<RollReceipt, RemoteError> {
        let wire: Vec<WireBet> = bets
            .iter()
            .map(|bet| WireBet {
                bet_type: bet.bet_type,
                number: bet.selector,
                amount: U256::from(bet.stake),
            })
            .collect();
        let call = self.contract.roll(wire).gas(ROLL_GAS_LIMIT);
        let receipt = self.send(call).await?;
        let event = self.roll_event(&receipt)?;
        Ok(RollReceipt {
            tx_hash: Some(format!("{:#x}", receipt.transaction_hash)),
            event,
        })
    }
}

/// A locally held key talking to one RPC endpoint at a time. Switching network
/// reconnects to the target network's RPC URL.
pub struct EthersWallet {
    signer: LocalWallet,
    provider: Provider<Http>,
}

impl EthersWallet {
    pub fn connect(signer: LocalWallet, rpc_url: &str) -> Result<Self, RemoteError> {
        Ok(Self {
            signer,
            provider: connect_provider(rpc_url)?,
        })
    }
}

#[async_trait]
impl WalletSession for EthersWallet {
    type Contract = EthersRoulette;

    async fn accounts(&self) -> Result<Vec<Address>, RemoteError> {
        Ok(vec![self.signer.address()])
    }

    async fn chain_id(&self) -> Result<u64, RemoteError> {
        let chain_id = self.provider.get_chainid().await.map_err(transport)?;
        Ok(chain_id.as_u64())
    }

    async fn switch_network(&mut self, network: &NetworkConfig) -> Result<(), RemoteError> {
        self.provider = connect_provider(&network.rpc_url)?;
        Ok(())
    }

    async fn has_contract_code(&self, address: Address) -> Result<bool, RemoteError> {
        let code = self
            .provider
            .get_code(address, None)
            .await
            .map_err(transport)?;
        Ok(!code.is_empty())
    }

    fn contract(
        &self,
        network: &NetworkConfig,
        account: Address,
    ) -> Result<EthersRoulette, RemoteError> {
        let client = signed_client(
            self.provider.clone(),
            self.signer.clone(),
            network.chain_id,
        );
        Ok(EthersRoulette::new(network.contract_address, account, client))
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn reason_from_message__extracts_hardhat_reason_string() {
        let message = "Error: VM Exception while processing transaction: \
                       reverted with reason string 'Insufficient player balance'";
        assert_eq!(
            reason_from_message(message).as_deref(),
            Some("Insufficient player balance")
        );
        assert_eq!(reason_from_message("connection refused"), None);
    }

    #[test]
    fn raw_roll_from_tokens__reads_number_and_results() {
        // given
        let fields = vec![
            Token::Uint(U256::from(17u8)),
            Token::Array(vec![Token::Uint(U256::zero()), Token::Uint(U256::from(70u8))]),
        ];

        // when
        let raw = raw_roll_from_tokens(fields).unwrap();

        // then
        assert_eq!(raw.random_number, U256::from(17u8));
        assert_eq!(raw.bet_results, vec![U256::zero(), U256::from(70u8)]);
    }

    #[test]
    fn raw_roll_from_tokens__rejects_missing_results() {
        let result = raw_roll_from_tokens(vec![Token::Uint(U256::one())]);
        assert!(matches!(result, Err(RemoteError::Malformed(_))));
    }
}
