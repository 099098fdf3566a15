//! Orchestration of the order lifecycle: build, sign, publish, and settle
//! against the directory service and the settlement contract.

use {
    crate::{
        deployment::Deployment,
        directory::{AcceptRequest, CancelRequest, Directory, DirectoryError, OrderSubmission},
        ledger::{Ledger, LedgerError},
    },
    model::{
        builder::{self, BuildError, ListingTerms, OfferTerms},
        codec,
        order::TokenStandard,
        settlement::{self, Op, SettlementRejected},
        signature::{self, EcdsaSignature, Signer, SigningFailed},
    },
    primitive_types::{H160, H256, U256},
    std::sync::Arc,
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("no matching order found")]
    NoOrderFound,
    #[error("listing is priced at {actual}, not {expected}")]
    PriceMismatch { expected: U256, actual: U256 },
    #[error("cancellation instruction names no items")]
    EmptyCancelInstruction,
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Signing(#[from] SigningFailed),
    #[error(transparent)]
    Settlement(#[from] SettlementRejected),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// A new sell listing.
#[derive(Clone, Debug)]
pub struct ListRequest {
    pub token: H160,
    pub token_id: U256,
    pub standard: TokenStandard,
    pub price: U256,
    pub deadline: u64,
    /// Royalty in basis points passed through to the venue.
    pub royalty: Option<u32>,
}

/// A new buy offer.
#[derive(Clone, Debug)]
pub struct OfferRequest {
    pub token: H160,
    /// Ignored for collection-wide offers.
    pub token_id: Option<U256>,
    pub standard: TokenStandard,
    /// Payment token; offers cannot settle in the native currency. Defaults
    /// to the deployment's wrapped native token.
    pub currency: Option<H160>,
    pub price: U256,
    pub deadline: u64,
    pub collection_wide: bool,
}

/// Handle over one marketplace deployment. Holds no mutable state; clones
/// share the directory and ledger handles.
#[derive(Clone)]
pub struct Client {
    deployment: Deployment,
    directory: Arc<dyn Directory>,
    ledger: Arc<dyn Ledger>,
}

impl Client {
    pub fn new(
        deployment: Deployment,
        directory: Arc<dyn Directory>,
        ledger: Arc<dyn Ledger>,
    ) -> Self {
        Self {
            deployment,
            directory,
            ledger,
        }
    }

    /// Signs and publishes a new sell listing.
    pub async fn list(&self, signer: &dyn Signer, request: &ListRequest) -> Result<(), Error> {
        let terms = ListingTerms {
            maker: signer.address(),
            network: self.deployment.network,
            token: request.token,
            token_id: request.token_id,
            standard: request.standard,
            price: request.price,
            deadline: request.deadline,
        };
        let order = builder::sell_order(&terms, self.deployment.item_schema)?;
        let order = signature::sign_order(order, signer).await?;
        tracing::debug!(maker = ?terms.maker, token = ?terms.token, "publishing sell listing");
        Ok(self
            .directory
            .submit_order(OrderSubmission {
                order: codec::encode_order(&order),
                is_collection: false,
                change_price: false,
                replaces_order_id: None,
                royalty: request.royalty,
            })
            .await?)
    }

    /// Replaces the caller's live listing for the token with a strictly
    /// cheaper one. Keeps the current deadline unless a new one is given.
    pub async fn lower_price(
        &self,
        signer: &dyn Signer,
        token: H160,
        token_id: U256,
        price: U256,
        deadline: Option<u64>,
    ) -> Result<(), Error> {
        let maker = signer.address();
        let listing = self
            .directory
            .sell_listing(Some(maker), token, token_id)
            .await?
            .ok_or(Error::NoOrderFound)?;
        let terms = ListingTerms {
            maker,
            network: self.deployment.network,
            token,
            token_id,
            standard: listing.token.erc_type,
            price,
            deadline: deadline.unwrap_or(listing.end_at),
        };
        let order = builder::lower_price(&terms, listing.price, self.deployment.item_schema)?;
        let order = signature::sign_order(order, signer).await?;
        tracing::debug!(listing = listing.id, %price, "lowering listing price");
        Ok(self
            .directory
            .submit_order(OrderSubmission {
                order: codec::encode_order(&order),
                is_collection: false,
                change_price: true,
                replaces_order_id: Some(listing.id),
                royalty: None,
            })
            .await?)
    }

    /// Signs and publishes a buy offer, single-token or collection-wide.
    pub async fn offer(&self, signer: &dyn Signer, request: &OfferRequest) -> Result<(), Error> {
        let terms = OfferTerms {
            maker: signer.address(),
            network: self.deployment.network,
            token: request.token,
            token_id: request.token_id,
            standard: request.standard,
            currency: request
                .currency
                .unwrap_or(self.deployment.wrapped_native),
            price: request.price,
            deadline: request.deadline,
            collection_wide: request.collection_wide,
        };
        let order = builder::buy_offer(&terms, self.deployment.item_schema)?;
        let order = signature::sign_offer(order, signer).await?;
        tracing::debug!(
            maker = ?terms.maker,
            collection_wide = terms.collection_wide,
            "publishing buy offer"
        );
        Ok(self
            .directory
            .submit_order(OrderSubmission {
                order: codec::encode_order(&order),
                is_collection: request.collection_wide,
                change_price: false,
                replaces_order_id: None,
                royalty: None,
            })
            .await?)
    }

    /// Cancels one of the caller's orders. The directory service turns the
    /// signed request into a contract instruction; an instruction naming no
    /// items is refused before it can reach the chain.
    pub async fn cancel(&self, signer: &dyn Signer, order_id: u64) -> Result<H256, Error> {
        let digest = signature::cancellation_digest();
        let raw = signer.sign_message(digest).await?;
        let input = self
            .directory
            .cancel_instruction(CancelRequest {
                caller: signer.address(),
                op: Op::CancelOffer,
                order_id,
                sign_message: digest,
                sign: EcdsaSignature::from_bytes(&raw).normalized(),
            })
            .await?;
        if input.item_hashes.is_empty() {
            tracing::warn!(order_id, "directory issued a cancellation naming no items");
            return Err(Error::EmptyCancelInstruction);
        }
        Ok(self.ledger.cancel(input).await?)
    }

    /// Looks up the caller's live listing for the token and cancels it.
    pub async fn cancel_listing(
        &self,
        signer: &dyn Signer,
        token: H160,
        token_id: U256,
    ) -> Result<H256, Error> {
        let listing = self
            .directory
            .sell_listing(Some(signer.address()), token, token_id)
            .await?
            .ok_or(Error::NoOrderFound)?;
        self.cancel(signer, listing.id).await
    }

    /// Buys a listed token at its quoted price. The price is re-checked
    /// against the live listing so a re-priced order is never settled
    /// blindly.
    pub async fn buy(
        &self,
        signer: &dyn Signer,
        token: H160,
        token_id: U256,
        price: U256,
    ) -> Result<H256, Error> {
        let listing = self
            .directory
            .sell_listing(None, token, token_id)
            .await?
            .ok_or(Error::NoOrderFound)?;
        if listing.price != price {
            return Err(Error::PriceMismatch {
                expected: price,
                actual: listing.price,
            });
        }
        self.accept(
            signer,
            Op::CompleteSellOffer,
            listing.id,
            listing.currency,
            listing.price,
            None,
        )
        .await
    }

    /// Accepts a buy offer on a token the caller owns. `token_id` selects the
    /// token to settle with for collection-wide offers.
    pub async fn accept_offer(
        &self,
        signer: &dyn Signer,
        order_id: u64,
        token_id: Option<U256>,
    ) -> Result<H256, Error> {
        self.accept(
            signer,
            Op::CompleteBuyOffer,
            order_id,
            H160::zero(),
            U256::zero(),
            token_id,
        )
        .await
    }

    async fn accept(
        &self,
        signer: &dyn Signer,
        op: Op,
        order_id: u64,
        currency: H160,
        price: U256,
        token_id: Option<U256>,
    ) -> Result<H256, Error> {
        let input = self
            .directory
            .settlement_instruction(AcceptRequest {
                caller: signer.address(),
                op,
                order_id,
                currency,
                price,
                token_id,
            })
            .await?
            .ok_or(Error::Settlement(SettlementRejected::Empty))?;
        let native_value = settlement::validate_run_input(&input, op).map_err(|err| {
            tracing::warn!(%err, order_id, "refusing settlement instruction");
            err
        })?;
        tracing::debug!(order_id, %native_value, "submitting settlement");
        Ok(self.ledger.run(input, native_value).await?)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            directory::{ListedToken, Listing, MockDirectory},
            ledger::MockLedger,
        },
        model::{
            order::{DelegateType, Intent, Order, OrderData, OrderItem, SIGN_VERSION},
            settlement::{RunInput, SettleDetail, SettleShared},
        },
    };

    struct StubSigner;

    #[async_trait::async_trait]
    impl Signer for StubSigner {
        fn address(&self) -> H160 {
            H160::repeat_byte(0x42)
        }

        async fn sign_message(&self, _digest: H256) -> Result<[u8; 65], SigningFailed> {
            let mut bytes = [0u8; 65];
            bytes[..32].copy_from_slice(H256::repeat_byte(0x01).as_bytes());
            bytes[32..64].copy_from_slice(H256::repeat_byte(0x02).as_bytes());
            bytes[64] = 1;
            Ok(bytes)
        }
    }

    fn client(directory: MockDirectory, ledger: MockLedger) -> Client {
        Client::new(
            Deployment::mainnet(),
            Arc::new(directory),
            Arc::new(ledger),
        )
    }

    fn deadline() -> u64 {
        chrono::offset::Utc::now().timestamp().max(0) as u64 + 3600
    }

    fn listing(id: u64, price: u64, currency: H160) -> Listing {
        Listing {
            id,
            item_hash: H256::repeat_byte(0x11),
            maker: H160::repeat_byte(0x66),
            currency,
            price: price.into(),
            end_at: deadline(),
            token: ListedToken {
                contract: H160::repeat_byte(0x02),
                token_id: 7.into(),
                erc_type: TokenStandard::Erc721,
            },
        }
    }

    fn counterparty_order(currency: H160, price: u64) -> Order {
        Order {
            data: OrderData {
                salt: 42.into(),
                user: H160::repeat_byte(0x66),
                network: 1,
                intent: Intent::Sell,
                delegate_type: DelegateType::Erc721,
                deadline: deadline(),
                currency,
                data_mask: Vec::new(),
                items: vec![OrderItem {
                    price: price.into(),
                    data: Vec::new(),
                }],
            },
            signature: EcdsaSignature {
                r: H256::repeat_byte(0x0a),
                s: H256::repeat_byte(0x0b),
                v: 27,
            },
            sign_version: SIGN_VERSION,
        }
    }

    fn run_input(op: Op, currency: H160, price: u64) -> RunInput {
        RunInput {
            orders: vec![counterparty_order(currency, price)],
            details: vec![SettleDetail {
                op,
                order_idx: U256::zero(),
                item_idx: U256::zero(),
                price: price.into(),
                item_hash: H256::repeat_byte(0x11),
                execution_delegate: H160::repeat_byte(0x03),
                data_replacement: Vec::new(),
                bid_incentive_pct: U256::zero(),
                auc_min_increment_pct: U256::zero(),
                auc_inc_duration_secs: U256::zero(),
                fees: Vec::new(),
            }],
            shared: SettleShared {
                salt: 9.into(),
                deadline: U256::from(deadline()),
                amount_to_eth: U256::zero(),
                amount_to_weth: U256::zero(),
                user: H160::repeat_byte(0x42),
                can_fail: false,
            },
            signature: EcdsaSignature {
                r: H256::repeat_byte(0x0d),
                s: H256::repeat_byte(0x0e),
                v: 27,
            },
        }
    }

    #[tokio::test]
    async fn list_publishes_a_signed_order() {
        let mut directory = MockDirectory::new();
        directory
            .expect_submit_order()
            .withf(|submission| {
                let order = codec::decode_order(&submission.order).unwrap();
                order.data.user == H160::repeat_byte(0x42)
                    && order.data.intent == Intent::Sell
                    && order.data.network == 1
                    && order.signature.v == 28
                    && !submission.change_price
                    && !submission.is_collection
            })
            .returning(|_| Ok(()));

        let client = client(directory, MockLedger::new());
        let request = ListRequest {
            token: H160::repeat_byte(0x02),
            token_id: 7.into(),
            standard: TokenStandard::Erc721,
            price: 1000.into(),
            deadline: deadline(),
            royalty: Some(50),
        };
        client.list(&StubSigner, &request).await.unwrap();
    }

    #[tokio::test]
    async fn collection_offer_defaults_to_the_wrapped_native_token() {
        let mut directory = MockDirectory::new();
        directory
            .expect_submit_order()
            .withf(|submission| {
                let order = codec::decode_order(&submission.order).unwrap();
                submission.is_collection
                    && order.data.intent == Intent::Buy
                    && order.data.currency == Deployment::mainnet().wrapped_native
                    && !order.data.data_mask.is_empty()
            })
            .returning(|_| Ok(()));

        let client = client(directory, MockLedger::new());
        let request = OfferRequest {
            token: H160::repeat_byte(0x02),
            token_id: None,
            standard: TokenStandard::Erc721,
            currency: None,
            price: 1000.into(),
            deadline: deadline(),
            collection_wide: true,
        };
        client.offer(&StubSigner, &request).await.unwrap();
    }

    #[tokio::test]
    async fn lower_price_submits_a_price_change() {
        let mut directory = MockDirectory::new();
        let live = listing(3, 2000, H160::zero());
        directory
            .expect_sell_listing()
            .returning(move |_, _, _| Ok(Some(live.clone())));
        directory
            .expect_submit_order()
            .withf(|submission| {
                let order = codec::decode_order(&submission.order).unwrap();
                submission.change_price
                    && submission.replaces_order_id == Some(3)
                    && order.data.items[0].price == 1800.into()
            })
            .returning(|_| Ok(()));

        let client = client(directory, MockLedger::new());
        client
            .lower_price(
                &StubSigner,
                H160::repeat_byte(0x02),
                7.into(),
                1800.into(),
                Some(deadline()),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn lower_price_refuses_an_equal_price() {
        let mut directory = MockDirectory::new();
        let live = listing(3, 1800, H160::zero());
        directory
            .expect_sell_listing()
            .returning(move |_, _, _| Ok(Some(live.clone())));

        let client = client(directory, MockLedger::new());
        let result = client
            .lower_price(
                &StubSigner,
                H160::repeat_byte(0x02),
                7.into(),
                1800.into(),
                Some(deadline()),
            )
            .await;
        assert!(matches!(
            result,
            Err(Error::Build(BuildError::PriceNotLower { .. }))
        ));
    }

    #[tokio::test]
    async fn buy_attaches_the_validated_native_value() {
        let mut directory = MockDirectory::new();
        directory
            .expect_sell_listing()
            .returning(|_, _, _| Ok(Some(listing(7, 1000, H160::zero()))));
        directory
            .expect_settlement_instruction()
            .withf(|request| request.op == Op::CompleteSellOffer && request.order_id == 7)
            .returning(|_| Ok(Some(run_input(Op::CompleteSellOffer, H160::zero(), 1000))));

        let mut ledger = MockLedger::new();
        ledger
            .expect_run()
            .withf(|_, native_value| *native_value == 1000.into())
            .returning(|_, _| Ok(H256::repeat_byte(0x99)));

        let client = client(directory, ledger);
        let tx = client
            .buy(&StubSigner, H160::repeat_byte(0x02), 7.into(), 1000.into())
            .await
            .unwrap();
        assert_eq!(tx, H256::repeat_byte(0x99));
    }

    #[tokio::test]
    async fn buy_refuses_a_repriced_listing() {
        let mut directory = MockDirectory::new();
        directory
            .expect_sell_listing()
            .returning(|_, _, _| Ok(Some(listing(7, 1500, H160::zero()))));

        // no settlement_instruction expectation: asking for one would panic
        let client = client(directory, MockLedger::new());
        let result = client
            .buy(&StubSigner, H160::repeat_byte(0x02), 7.into(), 1000.into())
            .await;
        assert!(matches!(result, Err(Error::PriceMismatch { .. })));
    }

    #[tokio::test]
    async fn tampered_settlement_instruction_never_reaches_the_ledger() {
        let mut directory = MockDirectory::new();
        directory
            .expect_sell_listing()
            .returning(|_, _, _| Ok(Some(listing(7, 1000, H160::zero()))));
        // the directory answers with a buy-offer completion instead of the
        // requested sell-offer completion
        directory
            .expect_settlement_instruction()
            .returning(|_| Ok(Some(run_input(Op::CompleteBuyOffer, H160::zero(), 1000))));

        let client = client(directory, MockLedger::new());
        let result = client
            .buy(&StubSigner, H160::repeat_byte(0x02), 7.into(), 1000.into())
            .await;
        assert!(matches!(
            result,
            Err(Error::Settlement(SettlementRejected::OpMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn unmatchable_order_is_a_rejected_settlement() {
        let mut directory = MockDirectory::new();
        directory
            .expect_sell_listing()
            .returning(|_, _, _| Ok(Some(listing(7, 1000, H160::zero()))));
        directory
            .expect_settlement_instruction()
            .returning(|_| Ok(None));

        let client = client(directory, MockLedger::new());
        let result = client
            .buy(&StubSigner, H160::repeat_byte(0x02), 7.into(), 1000.into())
            .await;
        assert!(matches!(
            result,
            Err(Error::Settlement(SettlementRejected::Empty))
        ));
    }

    #[tokio::test]
    async fn accept_offer_settles_through_the_payment_token() {
        let mut directory = MockDirectory::new();
        directory
            .expect_settlement_instruction()
            .withf(|request| {
                request.op == Op::CompleteBuyOffer
                    && request.currency == H160::zero()
                    && request.price == U256::zero()
                    && request.token_id == Some(7.into())
            })
            .returning(|_| {
                Ok(Some(run_input(
                    Op::CompleteBuyOffer,
                    H160::repeat_byte(0xcc),
                    1000,
                )))
            });

        let mut ledger = MockLedger::new();
        ledger
            .expect_run()
            .withf(|_, native_value| native_value.is_zero())
            .returning(|_, _| Ok(H256::repeat_byte(0x77)));

        let client = client(directory, ledger);
        client
            .accept_offer(&StubSigner, 21, Some(7.into()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancel_relays_the_directory_instruction() {
        let mut directory = MockDirectory::new();
        directory
            .expect_cancel_instruction()
            .withf(|request| {
                request.op == Op::CancelOffer
                    && request.caller == H160::repeat_byte(0x42)
                    && request.sign_message == signature::cancellation_digest()
                    && request.sign.v == 28
            })
            .returning(|_| {
                Ok(model::settlement::CancelInput {
                    item_hashes: vec![H256::repeat_byte(0x11)],
                    deadline: U256::from(2_000_000_000u64),
                    signature: EcdsaSignature {
                        r: H256::repeat_byte(0x0a),
                        s: H256::repeat_byte(0x0b),
                        v: 27,
                    },
                })
            });

        let mut ledger = MockLedger::new();
        ledger
            .expect_cancel()
            .withf(|input| input.item_hashes.len() == 1)
            .returning(|_| Ok(H256::repeat_byte(0x88)));

        let client = client(directory, ledger);
        let tx = client.cancel(&StubSigner, 11).await.unwrap();
        assert_eq!(tx, H256::repeat_byte(0x88));
    }

    #[tokio::test]
    async fn empty_cancellation_never_reaches_the_ledger() {
        let mut directory = MockDirectory::new();
        directory.expect_cancel_instruction().returning(|_| {
            Ok(model::settlement::CancelInput {
                item_hashes: Vec::new(),
                deadline: U256::from(2_000_000_000u64),
                signature: EcdsaSignature::default(),
            })
        });

        let client = client(directory, MockLedger::new());
        let result = client.cancel(&StubSigner, 11).await;
        assert!(matches!(result, Err(Error::EmptyCancelInstruction)));
    }

    #[tokio::test]
    async fn cancel_listing_resolves_the_order_id_first() {
        let mut directory = MockDirectory::new();
        directory
            .expect_sell_listing()
            .withf(|maker, _, _| *maker == Some(H160::repeat_byte(0x42)))
            .returning(|_, _, _| Ok(Some(listing(5, 1000, H160::zero()))));
        directory
            .expect_cancel_instruction()
            .withf(|request| request.order_id == 5)
            .returning(|_| {
                Ok(model::settlement::CancelInput {
                    item_hashes: vec![H256::repeat_byte(0x11)],
                    deadline: U256::from(2_000_000_000u64),
                    signature: EcdsaSignature::default(),
                })
            });

        let mut ledger = MockLedger::new();
        ledger
            .expect_cancel()
            .returning(|_| Ok(H256::repeat_byte(0x88)));

        let client = client(directory, ledger);
        client
            .cancel_listing(&StubSigner, H160::repeat_byte(0x02), 7.into())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_listing_is_reported() {
        let mut directory = MockDirectory::new();
        directory
            .expect_sell_listing()
            .returning(|_, _, _| Ok(None));

        let client = client(directory, MockLedger::new());
        let result = client
            .buy(&StubSigner, H160::repeat_byte(0x02), 7.into(), 1000.into())
            .await;
        assert!(matches!(result, Err(Error::NoOrderFound)));
    }
}
