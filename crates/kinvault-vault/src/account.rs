//! Registration, login, and password change
//!
//! Login is two steps: the stored Argon2 verifier gates the account (wrong
//! phone and wrong password are indistinguishable), then the identity
//! private key is unsealed locally with a key re-derived from the password.

use kinvault_core::{KinvaultError, UserId};
use kinvault_crypto::{hash_password, verify_password, IdentityBundle, IdentityKeypair};
use kinvault_store::{Credentials, NewUser, UserRow, VaultStore};
use rand::{CryptoRng, RngCore};
use secrecy::SecretString;

use crate::error::VaultResult;
use crate::{Session, Vault};

fn bundle_of(credentials: &Credentials) -> IdentityBundle {
    IdentityBundle {
        public_key: credentials.public_key.clone(),
        encrypted_private_key: credentials.encrypted_private_key.clone(),
        private_key_salt: credentials.private_key_salt.clone(),
        kdf: credentials.kdf,
    }
}

fn credentials_of<R: RngCore + CryptoRng>(
    bundle: IdentityBundle,
    password: &SecretString,
    rng: &mut R,
) -> VaultResult<Credentials> {
    Ok(Credentials {
        password_hash: hash_password(password, rng)?,
        public_key: bundle.public_key,
        encrypted_private_key: bundle.encrypted_private_key,
        private_key_salt: bundle.private_key_salt,
        kdf: bundle.kdf,
    })
}

impl<S: VaultStore> Vault<S> {
    /// Register a new user: generate an identity keypair, seal its private
    /// half under the password, and store the result.
    pub fn register<R: RngCore + CryptoRng>(
        &self,
        phone: &str,
        username: &str,
        password: &SecretString,
        rng: &mut R,
    ) -> VaultResult<UserRow> {
        // Fail fast before the expensive keygen; the store re-checks atomically
        if self.store().user_by_phone(phone)?.is_some() {
            return Err(KinvaultError::UserExists(phone.to_string()).into());
        }

        let identity = IdentityKeypair::generate(rng, self.settings().rsa_bits)?;
        let bundle = identity.seal(password, &self.settings().kdf, rng)?;
        let credentials = credentials_of(bundle, password, rng)?;

        let user = self.store().insert_user(NewUser {
            phone: phone.to_string(),
            username: username.to_string(),
            credentials,
        })?;
        tracing::info!(user_id = %user.id, "registered user");
        Ok(user)
    }

    /// Check a phone/password pair against the stored verifier.
    pub fn authenticate(&self, phone: &str, password: &SecretString) -> VaultResult<UserRow> {
        match self.store().user_by_phone(phone)? {
            Some(user) if verify_password(password, &user.credentials.password_hash) => Ok(user),
            _ => {
                tracing::debug!("authentication failed");
                Err(KinvaultError::InvalidCredentials.into())
            }
        }
    }

    /// Authenticate, then unseal the identity private key.
    pub fn login(&self, phone: &str, password: &SecretString) -> VaultResult<Session> {
        let user = self.authenticate(phone, password)?;
        let identity = IdentityKeypair::unseal(&bundle_of(&user.credentials), password)?;
        tracing::info!(user_id = %user.id, "identity unlocked");
        Ok(Session { user, identity })
    }

    /// Re-seal the same identity under a new password. The keypair does not
    /// change, so every wrapped family key held for this user stays valid.
    /// New KDF parameters from the current settings take effect here.
    pub fn change_password<R: RngCore + CryptoRng>(
        &self,
        phone: &str,
        old_password: &SecretString,
        new_password: &SecretString,
        rng: &mut R,
    ) -> VaultResult<()> {
        let user = self.authenticate(phone, old_password)?;
        let bundle = IdentityKeypair::reseal(
            &bundle_of(&user.credentials),
            old_password,
            new_password,
            &self.settings().kdf,
            rng,
        )?;
        let credentials = credentials_of(bundle, new_password, rng)?;
        self.store().update_credentials(user.id, credentials)?;
        tracing::info!(user_id = %user.id, "password changed");
        Ok(())
    }

    pub fn user(&self, id: UserId) -> VaultResult<Option<UserRow>> {
        Ok(self.store().user(id)?)
    }
}
